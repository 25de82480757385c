use std::borrow::Cow;

use crate::bits::{least_bits, n_words, Word, WORD_BITS};
use crate::error::{Error, Result};

/// A fixed-width sequence of bits backed by the minimum number of words.
///
/// Bits beyond `bit_num` in the last word are always zero, so two vectors are
/// equal exactly when they have the same width and the same bit content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitVector {
    data: Vec<Word>,
    bit_num: usize,
}

impl BitVector {
    /// A zero-filled vector of `bit_num` bits. Returns `None` when `bit_num == 0`.
    pub fn new(bit_num: usize) -> Option<Self> {
        if bit_num == 0 {
            return None;
        }
        Some(Self {
            data: vec![0; n_words(bit_num, 1)],
            bit_num,
        })
    }

    /// Build a vector from raw words. Missing words are zero; extra words and
    /// bits beyond `bit_num` are dropped.
    pub fn from_words(mut data: Vec<Word>, bit_num: usize) -> Option<Self> {
        if bit_num == 0 {
            return None;
        }
        let len = n_words(bit_num, 1);
        data.resize(len, 0);
        data[len - 1] &= least_bits(bit_num - (len - 1) * WORD_BITS);
        Some(Self { data, bit_num })
    }

    /// Wrap words that already satisfy the width invariant.
    pub(crate) fn from_raw(data: Vec<Word>, bit_num: usize) -> Self {
        debug_assert_eq!(data.len(), n_words(bit_num, 1));
        Self { data, bit_num }
    }

    pub fn bit_num(&self) -> usize {
        self.bit_num
    }

    /// Backing words, least significant bit first.
    pub fn words(&self) -> &[Word] {
        &self.data
    }

    pub fn get(&self, index: usize) -> Result<bool> {
        self.check_bit(index)?;
        Ok((self.data[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1)
    }

    pub fn set(&mut self, index: usize, value: bool) -> Result<()> {
        self.check_bit(index)?;
        let mask = 1 << (index % WORD_BITS);
        if value {
            self.data[index / WORD_BITS] |= mask;
        } else {
            self.data[index / WORD_BITS] &= !mask;
        }
        Ok(())
    }

    pub fn count_ones(&self) -> u32 {
        self.data.iter().map(|w| w.count_ones()).sum()
    }

    /// Bitwise XOR against a vector of the same width.
    pub fn xor(&self, other: &BitVector) -> Result<BitVector> {
        self.check_width(other)?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a ^ b)
            .collect();
        Ok(Self::from_raw(data, self.bit_num))
    }

    /// Number of differing bit positions.
    pub fn hamming_distance(&self, other: &BitVector) -> Result<u32> {
        self.check_width(other)?;
        Ok(hamming_words(&self.data, &other.data))
    }

    fn check_bit(&self, index: usize) -> Result<()> {
        if index >= self.bit_num {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.bit_num,
            });
        }
        Ok(())
    }

    fn check_width(&self, other: &BitVector) -> Result<()> {
        if self.bit_num != other.bit_num {
            return Err(Error::BitWidthMismatch {
                expected: self.bit_num,
                got: other.bit_num,
            });
        }
        Ok(())
    }
}

pub(crate) fn hamming_words(a: &[Word], b: &[Word]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// A read-only snapshot of one packed-array row.
///
/// Depending on the array layout the words are either borrowed from the
/// array's storage or copied out of it. Either way the view is a snapshot
/// taken at call time: the borrow checker prevents mutating the array while a
/// borrowed view is alive, and an owned view never observes later writes.
#[derive(Debug, Clone)]
pub struct BitVectorView<'a> {
    data: Cow<'a, [Word]>,
    bit_num: usize,
}

impl<'a> BitVectorView<'a> {
    pub(crate) fn borrowed(data: &'a [Word], bit_num: usize) -> Self {
        Self {
            data: Cow::Borrowed(data),
            bit_num,
        }
    }

    pub(crate) fn owned(v: BitVector) -> Self {
        Self {
            data: Cow::Owned(v.data),
            bit_num: v.bit_num,
        }
    }

    pub fn bit_num(&self) -> usize {
        self.bit_num
    }

    pub fn words(&self) -> &[Word] {
        &self.data
    }

    /// True when the view aliases the array's storage.
    pub fn is_borrowed(&self) -> bool {
        matches!(self.data, Cow::Borrowed(_))
    }

    pub fn get(&self, index: usize) -> Result<bool> {
        if index >= self.bit_num {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.bit_num,
            });
        }
        Ok((self.data[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1)
    }

    pub fn count_ones(&self) -> u32 {
        self.data.iter().map(|w| w.count_ones()).sum()
    }

    /// Detach the snapshot into an owned vector.
    pub fn into_owned(self) -> BitVector {
        BitVector::from_raw(self.data.into_owned(), self.bit_num)
    }
}

impl PartialEq<BitVector> for BitVectorView<'_> {
    fn eq(&self, other: &BitVector) -> bool {
        self.bit_num == other.bit_num && *self.data == *other.data
    }
}

impl PartialEq for BitVectorView<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.bit_num == other.bit_num && self.data == other.data
    }
}

impl Eq for BitVectorView<'_> {}

impl From<BitVectorView<'_>> for BitVector {
    fn from(view: BitVectorView<'_>) -> Self {
        view.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_width_is_absent() {
        assert!(BitVector::new(0).is_none());
        assert!(BitVector::from_words(vec![1], 0).is_none());
    }

    #[test]
    fn test_new_is_zero_filled() {
        let v = BitVector::new(130).unwrap();
        assert_eq!(v.words().len(), 3);
        assert_eq!(v.count_ones(), 0);
        assert_eq!(v.bit_num(), 130);
    }

    #[test]
    fn test_get_set() {
        let mut v = BitVector::new(70).unwrap();
        v.set(0, true).unwrap();
        v.set(69, true).unwrap();
        assert!(v.get(0).unwrap());
        assert!(v.get(69).unwrap());
        assert!(!v.get(68).unwrap());
        assert_eq!(v.words(), &[1, 1 << 5]);

        v.set(0, false).unwrap();
        assert!(!v.get(0).unwrap());
    }

    #[test]
    fn test_bit_index_out_of_range() {
        let mut v = BitVector::new(8).unwrap();
        assert!(matches!(
            v.set(8, true),
            Err(Error::IndexOutOfRange { index: 8, len: 8 })
        ));
        assert!(v.get(100).is_err());
    }

    #[test]
    fn test_from_words_masks_tail() {
        let v = BitVector::from_words(vec![u64::MAX], 3).unwrap();
        assert_eq!(v.words(), &[0b111]);
        assert_eq!(v, BitVector::from_words(vec![0b111], 3).unwrap());

        let v = BitVector::from_words(vec![7], 65).unwrap();
        assert_eq!(v.words(), &[7, 0]);
    }

    #[test]
    fn test_equality_requires_same_width() {
        let a = BitVector::new(8).unwrap();
        let b = BitVector::new(9).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_xor_and_hamming() {
        let a = BitVector::from_words(vec![0b1010, 1], 65).unwrap();
        let b = BitVector::from_words(vec![0b0110, 0], 65).unwrap();
        let x = a.xor(&b).unwrap();
        assert_eq!(x.words(), &[0b1100, 1]);
        assert_eq!(a.hamming_distance(&b).unwrap(), 3);

        let c = BitVector::new(64).unwrap();
        assert!(matches!(
            a.hamming_distance(&c),
            Err(Error::BitWidthMismatch {
                expected: 65,
                got: 64
            })
        ));
    }

    #[test]
    fn test_view_round_trip() {
        let v = BitVector::from_words(vec![42], 64).unwrap();
        let words = [42u64];
        let borrowed = BitVectorView::borrowed(&words, 64);
        assert!(borrowed.is_borrowed());
        assert_eq!(borrowed, v);

        let owned = BitVectorView::owned(v.clone());
        assert!(!owned.is_borrowed());
        assert_eq!(owned, borrowed);
        assert_eq!(owned.into_owned(), v);
    }
}
