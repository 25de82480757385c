//! A reader/writer-locked [`EuclidLsh`] for sharing across threads.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::error::Result;
use crate::feature::FeatureVector;
use crate::index::{sketch_of, EuclidLsh, IndexStats, QueryResult, RowId};
use crate::metrics::{MetricsCollector, MetricsSnapshot};

/// Thread-safe wrapper around [`EuclidLsh`].
///
/// Queries proceed in parallel; `set_row` takes exclusive access via
/// `parking_lot::RwLock`. Projection runs before the lock is taken, so writers
/// hold it only long enough to store a sketch and a norm.
pub struct SharedEuclidLsh {
    inner: RwLock<EuclidLsh>,
    hash_num: usize,
    metrics: Option<Arc<MetricsCollector>>,
}

impl std::fmt::Debug for SharedEuclidLsh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("SharedEuclidLsh")
            .field("num_rows", &inner.len())
            .field("hash_num", &self.hash_num)
            .field("has_metrics", &self.metrics.is_some())
            .finish()
    }
}

impl SharedEuclidLsh {
    pub fn new(index: EuclidLsh) -> Self {
        Self {
            hash_num: index.hash_num(),
            inner: RwLock::new(index),
            metrics: None,
        }
    }

    /// Like [`SharedEuclidLsh::new`], recording query and insert metrics.
    pub fn with_metrics(index: EuclidLsh) -> Self {
        Self {
            metrics: Some(Arc::new(MetricsCollector::new())),
            ..Self::new(index)
        }
    }

    pub fn hash_num(&self) -> usize {
        self.hash_num
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Insert or overwrite row `id`.
    pub fn set_row(&self, id: RowId, fv: &FeatureVector) -> Result<()> {
        let sketch = sketch_of(fv, self.hash_num)?;
        let norm = fv.l2_norm();
        let outcome = self.inner.write().store(id, &sketch, norm)?;
        if let Some(ref m) = self.metrics {
            m.record_store(&outcome);
        }
        Ok(())
    }

    pub fn query_by_row(&self, id: RowId, size: usize) -> Result<Vec<QueryResult>> {
        let start = self.metrics.as_ref().map(|_| Instant::now());
        let inner = self.inner.read();
        let results = inner.query_by_row(id, size)?;
        self.record_query(start, inner.len(), &results);
        Ok(results)
    }

    pub fn query_by_vector(&self, fv: &FeatureVector, size: usize) -> Result<Vec<QueryResult>> {
        let start = self.metrics.as_ref().map(|_| Instant::now());
        let sketch = sketch_of(fv, self.hash_num)?;
        let inner = self.inner.read();
        let results = inner.query_by_sketch(&sketch, fv.l2_norm(), size)?;
        self.record_query(start, inner.len(), &results);
        Ok(results)
    }

    fn record_query(&self, start: Option<Instant>, rows: usize, results: &[QueryResult]) {
        if let (Some(m), Some(start)) = (&self.metrics, start) {
            m.record_query(rows, self.hash_num, results.len(), start.elapsed());
        }
    }

    pub fn stats(&self) -> IndexStats {
        self.inner.read().stats()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    /// Serialize under a read lock.
    pub fn save<W: Write>(&self, w: W) -> Result<()> {
        self.inner.read().save(w)
    }

    /// Load an index written by [`EuclidLsh::save`] or [`SharedEuclidLsh::save`].
    pub fn load<R: Read>(r: R) -> Result<Self> {
        Ok(Self::new(EuclidLsh::load(r)?))
    }

    /// Snapshot of runtime metrics (`None` if metrics were not enabled).
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().map(|m| m.snapshot())
    }

    /// Reset metrics counters.
    pub fn reset_metrics(&self) {
        if let Some(ref m) = self.metrics {
            m.reset();
        }
    }

    pub fn into_inner(self) -> EuclidLsh {
        self.inner.into_inner()
    }
}

impl From<EuclidLsh> for SharedEuclidLsh {
    fn from(index: EuclidLsh) -> Self {
        Self::new(index)
    }
}

// ---------------------------------------------------------------------------
// Parallel batch ops (behind `parallel` feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "parallel")]
impl SharedEuclidLsh {
    /// Insert many rows, projecting them on the rayon pool.
    ///
    /// All sketches are computed before the write lock is taken; the rows are
    /// then stored in input order, so a repeated id keeps its last vector.
    pub fn par_set_rows(&self, rows: &[(RowId, FeatureVector)]) -> Result<()> {
        use rayon::prelude::*;

        let hash_num = self.hash_num;
        let prepared: Vec<_> = rows
            .par_iter()
            .map(|(id, fv)| Ok((*id, sketch_of(fv, hash_num)?, fv.l2_norm())))
            .collect::<Result<_>>()?;

        let mut inner = self.inner.write();
        for (id, sketch, norm) in &prepared {
            let outcome = inner.store(*id, sketch, *norm)?;
            if let Some(ref m) = self.metrics {
                m.record_store(&outcome);
            }
        }
        Ok(())
    }

    /// Run many vector queries in parallel.
    pub fn par_query_batch(
        &self,
        queries: &[FeatureVector],
        size: usize,
    ) -> Result<Vec<Vec<QueryResult>>> {
        use rayon::prelude::*;

        queries
            .par_iter()
            .map(|q| self.query_by_vector(q, size))
            .collect()
    }
}
