//! Runtime counters for [`SharedEuclidLsh`](crate::SharedEuclidLsh).
//!
//! Queries are linear scans, so the interesting numbers are how many sketch
//! bits each scan compares and how fast, plus how writes shape the row space:
//! fresh slots, reused slots, gap rows left below sparse ids and buffer
//! reallocations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::index::StoreOutcome;

/// Lock-free counters updated by the shared index.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    queries: AtomicU64,
    query_time_ns: AtomicU64,
    bits_compared: AtomicU64,
    results_returned: AtomicU64,
    rows_written: AtomicU64,
    slots_reused: AtomicU64,
    gap_rows: AtomicU64,
    capacity_growths: AtomicU64,
}

fn add(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// One scan over `rows` sketches of `hash_num` bits.
    pub(crate) fn record_query(
        &self,
        rows: usize,
        hash_num: usize,
        returned: usize,
        elapsed: Duration,
    ) {
        add(&self.queries, 1);
        add(&self.query_time_ns, elapsed.as_nanos() as u64);
        add(&self.bits_compared, rows as u64 * hash_num as u64);
        add(&self.results_returned, returned as u64);
    }

    pub(crate) fn record_store(&self, outcome: &StoreOutcome) {
        add(&self.rows_written, 1);
        add(&self.slots_reused, u64::from(outcome.reused_slot));
        add(&self.gap_rows, outcome.gap_rows as u64);
        add(&self.capacity_growths, u64::from(outcome.grew));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let queries = load(&self.queries);
        let query_time_ns = load(&self.query_time_ns);
        let bits_compared = load(&self.bits_compared);

        MetricsSnapshot {
            queries,
            rows_written: load(&self.rows_written),
            slots_reused: load(&self.slots_reused),
            gap_rows: load(&self.gap_rows),
            capacity_growths: load(&self.capacity_growths),
            avg_query_time_us: ratio(query_time_ns, queries) / 1000.0,
            avg_results_per_query: ratio(load(&self.results_returned), queries),
            bits_compared,
            // bits per nanosecond is Gbit/s
            scan_gbits_per_sec: ratio(bits_compared, query_time_ns),
        }
    }

    pub fn reset(&self) {
        for c in [
            &self.queries,
            &self.query_time_ns,
            &self.bits_compared,
            &self.results_returned,
            &self.rows_written,
            &self.slots_reused,
            &self.gap_rows,
            &self.capacity_growths,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

/// Counter values at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub queries: u64,
    /// `set_row` calls that succeeded.
    pub rows_written: u64,
    /// Writes that landed on an existing slot (overwrite or gap fill).
    pub slots_reused: u64,
    /// Zero rows created below sparse ids.
    pub gap_rows: u64,
    /// Writes that reallocated the sketch buffer.
    pub capacity_growths: u64,
    pub avg_query_time_us: f64,
    pub avg_results_per_query: f64,
    /// Sketch bits read across all queries.
    pub bits_compared: u64,
    pub scan_gbits_per_sec: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "queries={} ({:.2}us avg, {:.2} Gbit/s scanned), writes={} (reused {}, gaps {}, growths {})",
            self.queries,
            self.avg_query_time_us,
            self.scan_gbits_per_sec,
            self.rows_written,
            self.slots_reused,
            self.gap_rows,
            self.capacity_growths,
        )
    }
}
