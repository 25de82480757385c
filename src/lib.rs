//! # bitsketch
//!
//! Compact bit-packed storage for fixed-width bit-vectors, and an approximate
//! Euclidean nearest-neighbor index built on it with random-projection
//! locality-sensitive hashing (LSH).
//!
//! Each row of the index keeps only a `hash_num`-bit sign sketch and the L2
//! norm of its feature vector, so millions of rows fit in a few bytes each.
//! Queries scan every row, turn sketch Hamming distance into an angle, and
//! recover an estimated distance with the law of cosines.
//!
//! ## Quick start
//!
//! ```rust
//! use bitsketch::{EuclidLsh, FeatureVector};
//!
//! let mut index = EuclidLsh::builder().hash_num(64).build().unwrap();
//!
//! index.set_row(1, &FeatureVector::from([("temp", 21.0), ("load", 0.3)])).unwrap();
//! index.set_row(2, &FeatureVector::from([("temp", 35.0), ("load", 0.9)])).unwrap();
//!
//! let probe = FeatureVector::from([("temp", 21.0), ("load", 0.3)]);
//! let results = index.query_by_vector(&probe, 5).unwrap();
//! assert_eq!(results[0].id, 1);
//! for r in &results {
//!     println!("id={} dist={:.4}", r.id, r.distance);
//! }
//! ```
//!
//! ## Feature flags
//!
//! | Flag       | Effect                                                   |
//! |------------|----------------------------------------------------------|
//! | `parallel` | Parallel batch insert/query on `SharedEuclidLsh` (rayon) |
//! | `full`     | Enables `parallel`                                       |

pub mod array;
pub mod bits;
pub mod distance;
pub mod error;
pub mod feature;
pub mod hash;
pub mod index;
pub mod metrics;
pub mod persistence;
pub mod shared;
pub mod tuning;
pub mod vector;

// Re-exports for convenience.
pub use array::{BitArray, Layout, PackedArray};
pub use bits::{Word, WORD_BITS};
pub use error::{Error, Result};
pub use feature::FeatureVector;
pub use index::{EuclidLsh, EuclidLshBuilder, IndexConfig, IndexStats, QueryResult, RowId};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use shared::SharedEuclidLsh;
pub use tuning::{angle_std_error, suggest_hash_num, SuggestedHashNum};
pub use vector::{BitVector, BitVectorView};
