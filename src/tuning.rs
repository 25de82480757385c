use std::f64::consts::PI;

use crate::array::Layout;
use crate::bits::{n_words, WORD_BITS};

/// A sketch width suggested by [`suggest_hash_num`].
#[derive(Debug, Clone)]
pub struct SuggestedHashNum {
    pub hash_num: usize,
    /// Storage layout the width selects.
    pub layout: Layout,
    /// Sketch plus norm, per row.
    pub bytes_per_row: f64,
    /// Standard error of the angle estimate at `theta = pi / 2`, in radians.
    pub worst_case_angle_error: f64,
}

/// Standard error of the angle estimate `pi * H / hash_num`.
///
/// Each sketch bit differs independently with probability `p = theta / pi`, so
/// the Hamming count is Binomial(`hash_num`, `p`) and the estimate has
/// standard deviation `pi * sqrt(p * (1 - p) / hash_num)`.
pub fn angle_std_error(hash_num: usize, theta: f64) -> f64 {
    if hash_num == 0 {
        return f64::INFINITY;
    }
    let p = (theta / PI).clamp(0.0, 1.0);
    PI * (p * (1.0 - p) / hash_num as f64).sqrt()
}

/// Smallest sketch width whose worst-case angle error is at most
/// `max_angle_error` radians.
///
/// The worst case is `theta = pi / 2`, where the error is
/// `pi / (2 * sqrt(hash_num))`. Widths just below a word boundary are rounded
/// up to it when that costs no extra storage per row.
pub fn suggest_hash_num(max_angle_error: f64) -> SuggestedHashNum {
    let max_angle_error = max_angle_error.clamp(1e-3, PI / 2.0);
    let k = (PI / (2.0 * max_angle_error)).powi(2).ceil() as usize;
    let mut hash_num = k.max(1);

    // Whole words are as cheap as the partial word they replace and hit the
    // faster layouts.
    let words = n_words(hash_num, 1);
    if hash_num > WORD_BITS / 2 && hash_num % WORD_BITS != 0 {
        hash_num = words * WORD_BITS;
    }

    SuggestedHashNum {
        hash_num,
        layout: Layout::for_bit_num(hash_num),
        bytes_per_row: hash_num as f64 / 8.0 + std::mem::size_of::<f32>() as f64,
        worst_case_angle_error: angle_std_error(hash_num, PI / 2.0),
    }
}
