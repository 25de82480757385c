//! Word-level primitives shared by bit-vectors and packed arrays.

/// The storage and arithmetic unit for every bit operation.
pub type Word = u64;

/// Number of bits in a [`Word`].
pub const WORD_BITS: usize = Word::BITS as usize;

/// Number of words needed to hold `n` elements of `bit_num` bits each.
///
/// Callers must know `bit_num * n` fits in a `usize`; use [`checked_n_words`]
/// for untrusted sizes.
#[inline]
pub fn n_words(bit_num: usize, n: usize) -> usize {
    (bit_num * n).div_ceil(WORD_BITS)
}

/// Like [`n_words`], but `None` when the bit count overflows.
#[inline]
pub fn checked_n_words(bit_num: usize, n: usize) -> Option<usize> {
    bit_num.checked_mul(n).map(|bits| bits.div_ceil(WORD_BITS))
}

/// A word with the lowest `n` bits set. `n` may be anything in `0..=64`.
#[inline]
pub fn least_bits(n: usize) -> Word {
    if n >= WORD_BITS {
        Word::MAX
    } else {
        (1 << n) - 1
    }
}

/// Overwrite bits `[offset, offset + n)` of `dst` with the lowest `n` bits of `src`.
#[inline]
pub fn set_bits(dst: &mut Word, offset: usize, src: Word, n: usize) {
    if n == 0 {
        return;
    }
    debug_assert!(offset + n <= WORD_BITS);
    let mask = least_bits(n) << offset;
    *dst = (*dst & !mask) | ((src << offset) & mask);
}

/// Zero the bit range `[from, to)` of a word buffer.
pub fn clear_bit_range(data: &mut [Word], from: usize, to: usize) {
    if from >= to {
        return;
    }
    let l = from / WORD_BITS;
    let r = (to - 1) / WORD_BITS;
    let lo = from % WORD_BITS;
    let hi = (to - 1) % WORD_BITS + 1;
    if l == r {
        set_bits(&mut data[l], lo, 0, hi - lo);
        return;
    }
    set_bits(&mut data[l], lo, 0, WORD_BITS - lo);
    data[l + 1..r].fill(0);
    set_bits(&mut data[r], 0, 0, hi);
}
