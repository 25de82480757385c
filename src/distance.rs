//! Converting sketch Hamming distance back into Euclidean distance.
//!
//! For random-hyperplane sketches each bit differs with probability
//! `theta / pi`, where `theta` is the angle between the original vectors.
//! With stored norms the law of cosines then gives the distance.

use std::f64::consts::PI;

/// Angle estimate from the fraction of differing sketch bits.
pub fn estimate_angle(hamming: u32, hash_num: usize) -> f64 {
    hamming as f64 * PI / hash_num as f64
}

/// `|x - q|^2 - |q|^2` for a stored row of norm `norm` at angle `theta` to a
/// query of norm `query_norm`.
///
/// The query's own squared norm is the same for every row, so ranking by this
/// score ranks by estimated distance.
pub fn score(norm: f32, query_norm: f32, theta: f64) -> f32 {
    norm * (norm - 2.0 * query_norm * theta.cos() as f32)
}

/// Estimated distance from a [`score`]. Rounding never yields NaN.
pub fn estimated_distance(query_norm: f32, score: f32) -> f32 {
    (query_norm * query_norm + score).max(0.0).sqrt()
}
