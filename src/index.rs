use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::array::{BitArray, Layout, PackedArray};
use crate::bits::checked_n_words;
use crate::distance::{estimate_angle, estimated_distance, score};
use crate::error::{Error, Result};
use crate::feature::FeatureVector;
use crate::hash::cosine_lsh;
use crate::vector::{BitVector, BitVectorView};

/// External, 1-based row identity. Row `id` is stored at offset `id - 1`.
pub type RowId = usize;

/// Configuration for the LSH index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Sketch width in bits.
    pub hash_num: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { hash_num: 64 }
    }
}

/// A single nearest-neighbor result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryResult {
    /// The row ID.
    pub id: RowId,
    /// Estimated Euclidean distance from the query.
    pub distance: f32,
}

/// Aggregate statistics about the index.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub num_rows: usize,
    pub hash_num: usize,
    pub layout: Layout,
    pub row_capacity: usize,
    pub sketch_bytes: usize,
    pub norm_bytes: usize,
}

impl IndexStats {
    pub fn memory_estimate_bytes(&self) -> usize {
        self.sketch_bytes + self.norm_bytes
    }
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EuclidLsh {{ rows: {}, hash_num: {}, layout: {}, capacity: {}, mem: ~{:.1}KB }}",
            self.num_rows,
            self.hash_num,
            self.layout,
            self.row_capacity,
            self.memory_estimate_bytes() as f64 / 1024.0,
        )
    }
}

/// Sign sketch of `fv` with `hash_num` bits.
pub(crate) fn sketch_of(fv: &FeatureVector, hash_num: usize) -> Result<BitVector> {
    cosine_lsh(fv, hash_num).ok_or(Error::InvalidHashNum(hash_num))
}

/// How a [`EuclidLsh::store`] call changed the row space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct StoreOutcome {
    /// Row `id` already had a slot, set or gap, before the call.
    pub reused_slot: bool,
    /// Gap rows created below `id`.
    pub gap_rows: usize,
    /// The sketch buffer was reallocated.
    pub grew: bool,
}

fn offset(id: RowId) -> Result<usize> {
    id.checked_sub(1).ok_or(Error::InvalidRowId(id))
}

// ---------------------------------------------------------------------------
// EuclidLsh
// ---------------------------------------------------------------------------

/// Approximate Euclidean nearest-neighbor index over sparse feature vectors.
///
/// Each row keeps a `hash_num`-bit sign sketch and its L2 norm; the original
/// vector is discarded. Queries scan every row, so they cost O(rows).
///
/// Not synchronized: wrap it in a lock (or use
/// [`SharedEuclidLsh`](crate::SharedEuclidLsh)) to share across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct EuclidLsh {
    pub(crate) sketches: PackedArray,
    /// Parallel to `sketches`; the two always have the same length.
    pub(crate) norms: Vec<f32>,
}

impl EuclidLsh {
    /// Start building an index with the builder pattern.
    pub fn builder() -> EuclidLshBuilder {
        EuclidLshBuilder::new()
    }

    /// Create an empty index from an [`IndexConfig`].
    pub fn new(config: IndexConfig) -> Result<Self> {
        let sketches =
            PackedArray::new(config.hash_num).ok_or(Error::InvalidHashNum(config.hash_num))?;
        Ok(Self {
            sketches,
            norms: Vec::new(),
        })
    }

    pub(crate) fn from_parts(sketches: PackedArray, norms: Vec<f32>) -> Result<Self> {
        if sketches.len() != norms.len() {
            return Err(Error::InvalidRecord(format!(
                "{} norms for {} sketches",
                norms.len(),
                sketches.len()
            )));
        }
        Ok(Self { sketches, norms })
    }

    pub fn hash_num(&self) -> usize {
        self.sketches.bit_num()
    }

    pub fn config(&self) -> IndexConfig {
        IndexConfig {
            hash_num: self.hash_num(),
        }
    }

    /// Number of row slots, i.e. the highest row ID stored so far.
    ///
    /// IDs below it that were never set read as a zero sketch with norm 0.
    pub fn len(&self) -> usize {
        self.norms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.norms.is_empty()
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    /// Insert or overwrite row `id`.
    pub fn set_row(&mut self, id: RowId, fv: &FeatureVector) -> Result<()> {
        let sketch = sketch_of(fv, self.hash_num())?;
        self.store(id, &sketch, fv.l2_norm())?;
        Ok(())
    }

    pub(crate) fn store(
        &mut self,
        id: RowId,
        sketch: &BitVector,
        norm: f32,
    ) -> Result<StoreOutcome> {
        let off = offset(id)?;
        if sketch.bit_num() != self.hash_num() {
            return Err(Error::BitWidthMismatch {
                expected: self.hash_num(),
                got: sketch.bit_num(),
            });
        }

        let old_len = self.len();
        let mut outcome = StoreOutcome {
            reused_slot: id <= old_len,
            ..StoreOutcome::default()
        };
        if !outcome.reused_slot {
            outcome.gap_rows = id - old_len - 1;
            outcome.grew = self.extend(id)?;
        }
        self.sketches.set(off, sketch)?;
        self.norms[off] = norm;
        Ok(outcome)
    }

    /// Grow sketches and norms together to `n` rows, returning whether the
    /// sketch buffer was reallocated. On error neither side changes.
    fn extend(&mut self, n: usize) -> Result<bool> {
        if self.sketches.len() >= n {
            return Ok(false);
        }
        let hash_num = self.hash_num();
        let overflow = || Error::CapacityOverflow {
            rows: n,
            bit_num: hash_num,
        };
        checked_n_words(hash_num, n).ok_or_else(overflow)?;

        if self.norms.capacity() < n {
            let target = self
                .norms
                .capacity()
                .checked_mul(2)
                .map_or(n, |doubled| doubled.max(n));
            self.norms
                .try_reserve_exact(target - self.norms.len())
                .map_err(|_| overflow())?;
        }
        let old_capacity = self.sketches.capacity();
        self.sketches.resize(n)?;
        self.norms.resize(n, 0.0);

        let grew = self.sketches.capacity() != old_capacity;
        if grew {
            debug!(
                rows = n,
                capacity = self.sketches.capacity(),
                hash_num,
                "grew lsh index"
            );
        }
        Ok(grew)
    }

    /// Drop every row; the configured width is kept.
    pub fn clear(&mut self) {
        self.sketches.clear();
        self.norms.clear();
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Stored sketch of row `id`.
    pub fn row_sketch(&self, id: RowId) -> Result<BitVectorView<'_>> {
        self.sketches.get(offset(id)?)
    }

    /// Stored L2 norm of row `id`.
    pub fn row_norm(&self, id: RowId) -> Result<f32> {
        let off = offset(id)?;
        self.norms
            .get(off)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index: off,
                len: self.len(),
            })
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    /// The `size` rows nearest to stored row `id`, the row itself included.
    pub fn query_by_row(&self, id: RowId, size: usize) -> Result<Vec<QueryResult>> {
        let sketch = self.row_sketch(id)?.into_owned();
        let norm = self.row_norm(id)?;
        self.query_by_sketch(&sketch, norm, size)
    }

    /// The `size` rows nearest to `fv`.
    pub fn query_by_vector(&self, fv: &FeatureVector, size: usize) -> Result<Vec<QueryResult>> {
        let sketch = sketch_of(fv, self.hash_num())?;
        self.query_by_sketch(&sketch, fv.l2_norm(), size)
    }

    /// Rank every row against a query sketch and norm.
    ///
    /// Returns at most `size` results, ascending by estimated distance; ties
    /// keep row order.
    pub(crate) fn query_by_sketch(
        &self,
        sketch: &BitVector,
        query_norm: f32,
        size: usize,
    ) -> Result<Vec<QueryResult>> {
        let hash_num = self.hash_num();
        let mut scored: Vec<(f32, usize)> = Vec::with_capacity(self.len());
        for (i, &norm) in self.norms.iter().enumerate() {
            let h = self.sketches.hamming_distance(i, sketch)?;
            scored.push((score(norm, query_norm, estimate_angle(h, hash_num)), i));
        }

        let by_score =
            |a: &(f32, usize), b: &(f32, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
        let k = size.min(scored.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_score);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_score);

        trace!(rows = self.len(), returned = k, "lsh query");
        Ok(scored
            .into_iter()
            .map(|(s, i)| QueryResult {
                id: i + 1,
                distance: estimated_distance(query_norm, s),
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            num_rows: self.len(),
            hash_num: self.hash_num(),
            layout: self.sketches.layout(),
            row_capacity: self.sketches.capacity(),
            sketch_bytes: self.sketches.memory_bytes(),
            norm_bytes: self.norms.capacity() * std::mem::size_of::<f32>(),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for [`EuclidLsh`].
#[derive(Debug, Default)]
pub struct EuclidLshBuilder {
    config: IndexConfig,
}

impl EuclidLshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_num(mut self, n: usize) -> Self {
        self.config.hash_num = n;
        self
    }

    pub fn config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the index, returning an error on invalid configuration.
    pub fn build(self) -> Result<EuclidLsh> {
        EuclidLsh::new(self.config)
    }
}
