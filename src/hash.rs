use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::bits::{n_words, Word, WORD_BITS};
use crate::feature::FeatureVector;
use crate::vector::BitVector;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over the UTF-8 bytes of `s`. Seeds the projection of a dimension.
pub fn string_hash(s: &str) -> u64 {
    let mut h = FNV_OFFSET_BASIS;
    for &b in s.as_bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Random-hyperplane projection of a sparse vector onto `hash_num` axes.
///
/// Each dimension seeds its own ChaCha8 stream with [`string_hash`] of its
/// name and contributes `weight * N(0, 1)` to every axis, so the hyperplanes
/// exist only implicitly and never have to be stored. Dimensions are summed
/// in name order, which makes the result independent of entry order.
pub fn random_projection(fv: &FeatureVector, hash_num: usize) -> Array1<f32> {
    let mut proj = Array1::<f32>::zeros(hash_num);
    for (dim, weight) in fv.sorted_entries() {
        let mut rng = ChaCha8Rng::seed_from_u64(string_hash(dim));
        let draws: Array1<f32> = (0..hash_num)
            .map(|_| rng.sample::<f32, _>(StandardNormal))
            .collect();
        proj.scaled_add(weight, &draws);
    }
    proj
}

/// Sign sketch: bit `i` is set when `proj[i] > 0`.
///
/// Returns `None` for an empty projection.
pub fn binarize(proj: &Array1<f32>) -> Option<BitVector> {
    let bit_num = proj.len();
    if bit_num == 0 {
        return None;
    }
    let mut words: Vec<Word> = vec![0; n_words(bit_num, 1)];
    for (i, &x) in proj.iter().enumerate() {
        if x > 0.0 {
            words[i / WORD_BITS] |= 1 << (i % WORD_BITS);
        }
    }
    BitVector::from_words(words, bit_num)
}

/// `hash_num`-bit sign sketch of `fv`.
pub fn cosine_lsh(fv: &FeatureVector, hash_num: usize) -> Option<BitVector> {
    binarize(&random_projection(fv, hash_num))
}
