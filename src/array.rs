//! Dense storage for N fixed-width bit-vectors.
//!
//! Rows are packed back to back into a word buffer with no padding, so a row
//! may straddle a word boundary. The storage layout is chosen once from the
//! bit width:
//!
//! | Width                               | Layout                      |
//! |-------------------------------------|-----------------------------|
//! | `< 64`, power of two                | [`PowerOfTwoArray`]         |
//! | `< 64`, otherwise                   | [`SmallArray`]              |
//! | `== 64`                             | [`WordArray`]               |
//! | multiple of 64                      | [`MultiWordArray`]          |
//! | anything else                       | [`GeneralArray`]            |
//!
//! All layouts place row `n` at bits `[n * bit_num, (n + 1) * bit_num)` of the
//! buffer and agree bit for bit with [`GeneralArray`], which handles any width.

use std::fmt;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bits::{
    checked_n_words, clear_bit_range, least_bits, n_words, set_bits, Word, WORD_BITS,
};
use crate::error::{Error, Result};
use crate::vector::{hamming_words, BitVector, BitVectorView};

const ARRAY_FORMAT_VERSION: u8 = 1;

/// Set-bit count of every byte value.
static BYTE_POPCOUNT: [u8; 256] = byte_popcounts();

const fn byte_popcounts() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 1;
    while i < 256 {
        table[i] = table[i / 2] + (i & 1) as u8;
        i += 1;
    }
    table
}

/// The packed-array contract shared by every layout.
pub trait BitArray {
    /// Set the logical length. New rows read as zero; the word buffer never shrinks.
    ///
    /// Fails with [`Error::CapacityOverflow`] when `n` rows cannot be
    /// addressed or allocated; the array is left unchanged.
    fn resize(&mut self, n: usize) -> Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bit_num(&self) -> usize;

    /// Read row `n`. The returned view is a read-only snapshot.
    fn get(&self, n: usize) -> Result<BitVectorView<'_>>;

    /// Overwrite row `n` with `v`.
    fn set(&mut self, n: usize, v: &BitVector) -> Result<()>;

    /// Popcount of `get(n) XOR v`.
    fn hamming_distance(&self, n: usize, v: &BitVector) -> Result<u32>;
}

// ---------------------------------------------------------------------------
// Shared word buffer
// ---------------------------------------------------------------------------

/// Word buffer plus logical length, shared by all layouts.
///
/// Invariant: every bit at or beyond `len * bit_num` is zero, and
/// `data.len() >= n_words(bit_num, len)`.
#[derive(Debug, Clone)]
struct Storage {
    data: Vec<Word>,
    bit_num: usize,
    len: usize,
}

// Equality ignores spare capacity.
impl PartialEq for Storage {
    fn eq(&self, other: &Self) -> bool {
        self.bit_num == other.bit_num
            && self.len == other.len
            && self.live_words() == other.live_words()
    }
}

impl Eq for Storage {}

impl Storage {
    fn new(data: Vec<Word>, bit_num: usize, len: usize) -> Self {
        debug_assert!(bit_num > 0);
        debug_assert!(data.len() >= n_words(bit_num, len));
        Self { data, bit_num, len }
    }

    /// Number of rows the current buffer can hold.
    fn capacity(&self) -> usize {
        self.data.len() * WORD_BITS / self.bit_num
    }

    fn resize(&mut self, n: usize) -> Result<()> {
        if n < self.len {
            self.truncate(n);
        } else {
            self.reserve(n)?;
            self.len = n;
        }
        Ok(())
    }

    fn truncate(&mut self, n: usize) {
        if n >= self.len {
            return;
        }
        // Keep the zero-tail invariant so later growth exposes zero rows.
        clear_bit_range(&mut self.data, n * self.bit_num, self.len * self.bit_num);
        self.len = n;
    }

    fn reserve(&mut self, n: usize) -> Result<()> {
        let cap = self.capacity();
        if n <= cap {
            return Ok(());
        }
        let bit_num = self.bit_num;
        let overflow = || Error::CapacityOverflow { rows: n, bit_num };

        let needed = checked_n_words(bit_num, n).ok_or_else(overflow)?;
        // Doubling falls back to the exact size near the top of the address space.
        let words = cap
            .checked_mul(2)
            .filter(|&doubled| doubled > n)
            .and_then(|doubled| checked_n_words(bit_num, doubled))
            .unwrap_or(needed);
        self.data
            .try_reserve_exact(words - self.data.len())
            .map_err(|_| overflow())?;
        self.data.resize(words, 0);
        Ok(())
    }

    fn live_words(&self) -> &[Word] {
        &self.data[..n_words(self.bit_num, self.len)]
    }

    fn check_index(&self, n: usize) -> Result<()> {
        if n >= self.len {
            return Err(Error::IndexOutOfRange {
                index: n,
                len: self.len,
            });
        }
        Ok(())
    }

    fn check_width(&self, v: &BitVector) -> Result<()> {
        if v.bit_num() != self.bit_num {
            return Err(Error::BitWidthMismatch {
                expected: self.bit_num,
                got: v.bit_num(),
            });
        }
        Ok(())
    }
}

/// Implements the bookkeeping half of [`BitArray`] by forwarding to `Storage`.
macro_rules! storage_accessors {
    () => {
        fn resize(&mut self, n: usize) -> Result<()> {
            self.s.resize(n)
        }

        fn len(&self) -> usize {
            self.s.len
        }

        fn bit_num(&self) -> usize {
            self.s.bit_num
        }
    };
}

// ---------------------------------------------------------------------------
// General layout (any width)
// ---------------------------------------------------------------------------

/// Handles every width, including rows spanning several words with an
/// unaligned start. Serves as the reference the other layouts agree with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralArray {
    s: Storage,
}

impl GeneralArray {
    /// An empty array of `bit_num`-bit rows, regardless of which layout the
    /// width would normally select. Returns `None` when `bit_num == 0`.
    pub fn new(bit_num: usize) -> Option<Self> {
        if bit_num == 0 {
            return None;
        }
        Some(Self {
            s: Storage::new(Vec::new(), bit_num, 0),
        })
    }

    fn read(&self, n: usize) -> BitVector {
        let b = self.s.bit_num;
        let data = &self.s.data;

        // Row n lives in [lbit, rbit).
        let lbit = n * b;
        let rbit = lbit + b;
        let l = lbit / WORD_BITS;
        let r = rbit / WORD_BITS;
        let offset = lbit % WORD_BITS;
        let n_right = rbit % WORD_BITS;

        if l == r || (l + 1 == r && n_right == 0) {
            let x = (data[l] >> offset) & least_bits(b);
            return BitVector::from_raw(vec![x], b);
        }

        let len = n_words(b, 1);
        let mut out = vec![0; len];

        if offset == 0 {
            out.copy_from_slice(&data[l..l + len]);
            if n_right != 0 {
                out[len - 1] &= least_bits(n_right);
            }
            return BitVector::from_raw(out, b);
        }

        // Unaligned start: interior words are copied verbatim, then the low
        // bits of word r and the high bits of word l form the tail.
        let interior = r - l - 1;
        out[..interior].copy_from_slice(&data[l + 1..r]);

        let n_left = WORD_BITS - offset;
        let left = data[l] >> offset;
        if n_right == 0 {
            out[len - 1] = left;
        } else if n_left + n_right <= WORD_BITS {
            set_bits(&mut out[len - 1], 0, data[r], n_right);
            set_bits(&mut out[len - 1], n_right, left, n_left);
        } else {
            let tail = b % WORD_BITS;
            set_bits(&mut out[len - 2], 0, data[r], n_right);
            set_bits(&mut out[len - 2], n_right, left, WORD_BITS - n_right);
            set_bits(&mut out[len - 1], 0, left >> (WORD_BITS - n_right), tail);
        }
        BitVector::from_raw(out, b)
    }

    fn write(&mut self, n: usize, v: &[Word]) {
        let b = self.s.bit_num;
        let data = &mut self.s.data;

        let lbit = n * b;
        let rbit = lbit + b;
        let l = lbit / WORD_BITS;
        let r = rbit / WORD_BITS;
        let offset = lbit % WORD_BITS;
        let n_right = rbit % WORD_BITS;
        let k = v.len();

        if l == r || (l + 1 == r && n_right == 0) {
            set_bits(&mut data[l], offset, v[0], b);
            return;
        }

        if offset == 0 {
            if n_right == 0 {
                data[l..r].copy_from_slice(v);
            } else {
                data[l..r].copy_from_slice(&v[..k - 1]);
                set_bits(&mut data[r], 0, v[k - 1], n_right);
            }
            return;
        }

        let interior = r - l - 1;
        data[l + 1..r].copy_from_slice(&v[..interior]);

        let n_left = WORD_BITS - offset;
        if n_right == 0 {
            set_bits(&mut data[l], offset, v[k - 1], n_left);
        } else if n_left + n_right <= WORD_BITS {
            set_bits(&mut data[r], 0, v[k - 1], n_right);
            set_bits(&mut data[l], offset, v[k - 1] >> n_right, n_left);
        } else {
            let tail = b % WORD_BITS;
            set_bits(&mut data[r], 0, v[k - 2], n_right);
            set_bits(&mut data[l], offset, v[k - 2] >> n_right, WORD_BITS - n_right);
            set_bits(&mut data[l], WORD_BITS - tail, v[k - 1], tail);
        }
    }
}

impl BitArray for GeneralArray {
    storage_accessors!();

    fn get(&self, n: usize) -> Result<BitVectorView<'_>> {
        self.s.check_index(n)?;
        Ok(BitVectorView::owned(self.read(n)))
    }

    fn set(&mut self, n: usize, v: &BitVector) -> Result<()> {
        self.s.check_width(v)?;
        self.s.check_index(n)?;
        self.write(n, v.words());
        Ok(())
    }

    fn hamming_distance(&self, n: usize, v: &BitVector) -> Result<u32> {
        self.s.check_width(v)?;
        self.s.check_index(n)?;
        Ok(hamming_words(self.read(n).words(), v.words()))
    }
}

// ---------------------------------------------------------------------------
// Widths below one word
// ---------------------------------------------------------------------------

/// Widths 1, 2, 4, 8, 16 and 32: rows never straddle a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerOfTwoArray {
    s: Storage,
}

impl PowerOfTwoArray {
    fn locate(&self, n: usize) -> (usize, usize) {
        let per_word = WORD_BITS / self.s.bit_num;
        (n / per_word, (n % per_word) * self.s.bit_num)
    }

    fn word(&self, n: usize) -> Word {
        let (w, shift) = self.locate(n);
        (self.s.data[w] >> shift) & least_bits(self.s.bit_num)
    }
}

impl BitArray for PowerOfTwoArray {
    storage_accessors!();

    fn get(&self, n: usize) -> Result<BitVectorView<'_>> {
        self.s.check_index(n)?;
        Ok(BitVectorView::owned(BitVector::from_raw(
            vec![self.word(n)],
            self.s.bit_num,
        )))
    }

    fn set(&mut self, n: usize, v: &BitVector) -> Result<()> {
        self.s.check_width(v)?;
        self.s.check_index(n)?;
        let (w, shift) = self.locate(n);
        set_bits(&mut self.s.data[w], shift, v.words()[0], self.s.bit_num);
        Ok(())
    }

    fn hamming_distance(&self, n: usize, v: &BitVector) -> Result<u32> {
        self.s.check_width(v)?;
        self.s.check_index(n)?;
        let x = self.word(n) ^ v.words()[0];
        // x holds bit_num bits: one table lookup per byte of width.
        let bytes = self.s.bit_num.div_ceil(8);
        Ok((0..bytes)
            .map(|k| u32::from(BYTE_POPCOUNT[((x >> (8 * k)) & 0xff) as usize]))
            .sum())
    }
}

/// Widths below 64 that are not powers of two; a row may span two words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmallArray {
    s: Storage,
}

impl SmallArray {
    fn word(&self, n: usize) -> Word {
        let b = self.s.bit_num;
        let data = &self.s.data;
        let lbit = n * b;
        let rbit = lbit + b;
        let (l, r) = (lbit / WORD_BITS, rbit / WORD_BITS);
        let offset = lbit % WORD_BITS;
        let n_right = rbit % WORD_BITS;

        if l == r || n_right == 0 {
            return (data[l] >> offset) & least_bits(b);
        }
        (data[r] & least_bits(n_right)) | ((data[l] >> offset) << n_right)
    }
}

impl BitArray for SmallArray {
    storage_accessors!();

    fn get(&self, n: usize) -> Result<BitVectorView<'_>> {
        self.s.check_index(n)?;
        Ok(BitVectorView::owned(BitVector::from_raw(
            vec![self.word(n)],
            self.s.bit_num,
        )))
    }

    fn set(&mut self, n: usize, v: &BitVector) -> Result<()> {
        self.s.check_width(v)?;
        self.s.check_index(n)?;
        let b = self.s.bit_num;
        let x = v.words()[0];
        let lbit = n * b;
        let rbit = lbit + b;
        let (l, r) = (lbit / WORD_BITS, rbit / WORD_BITS);
        let n_right = rbit % WORD_BITS;
        let data = &mut self.s.data;

        if l == r || n_right == 0 {
            set_bits(&mut data[l], lbit % WORD_BITS, x, b);
        } else {
            set_bits(&mut data[r], 0, x, n_right);
            set_bits(&mut data[l], lbit % WORD_BITS, x >> n_right, b - n_right);
        }
        Ok(())
    }

    fn hamming_distance(&self, n: usize, v: &BitVector) -> Result<u32> {
        self.s.check_width(v)?;
        self.s.check_index(n)?;
        Ok((self.word(n) ^ v.words()[0]).count_ones())
    }
}

// ---------------------------------------------------------------------------
// Word-aligned widths
// ---------------------------------------------------------------------------

/// Exactly one word per row. `get` borrows straight from the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordArray {
    s: Storage,
}

impl BitArray for WordArray {
    storage_accessors!();

    fn get(&self, n: usize) -> Result<BitVectorView<'_>> {
        self.s.check_index(n)?;
        Ok(BitVectorView::borrowed(&self.s.data[n..n + 1], WORD_BITS))
    }

    fn set(&mut self, n: usize, v: &BitVector) -> Result<()> {
        self.s.check_width(v)?;
        self.s.check_index(n)?;
        self.s.data[n] = v.words()[0];
        Ok(())
    }

    fn hamming_distance(&self, n: usize, v: &BitVector) -> Result<u32> {
        self.s.check_width(v)?;
        self.s.check_index(n)?;
        Ok((self.s.data[n] ^ v.words()[0]).count_ones())
    }
}

/// Rows of `k * 64` bits, each occupying `k` whole words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiWordArray {
    s: Storage,
}

impl MultiWordArray {
    fn row(&self, n: usize) -> &[Word] {
        let k = self.s.bit_num / WORD_BITS;
        &self.s.data[n * k..(n + 1) * k]
    }
}

impl BitArray for MultiWordArray {
    storage_accessors!();

    fn get(&self, n: usize) -> Result<BitVectorView<'_>> {
        self.s.check_index(n)?;
        Ok(BitVectorView::owned(BitVector::from_raw(
            self.row(n).to_vec(),
            self.s.bit_num,
        )))
    }

    fn set(&mut self, n: usize, v: &BitVector) -> Result<()> {
        self.s.check_width(v)?;
        self.s.check_index(n)?;
        let k = self.s.bit_num / WORD_BITS;
        self.s.data[n * k..(n + 1) * k].copy_from_slice(v.words());
        Ok(())
    }

    fn hamming_distance(&self, n: usize, v: &BitVector) -> Result<u32> {
        self.s.check_width(v)?;
        self.s.check_index(n)?;
        Ok(hamming_words(self.row(n), v.words()))
    }
}

// ---------------------------------------------------------------------------
// PackedArray
// ---------------------------------------------------------------------------

/// Which storage layout a [`PackedArray`] selected for its width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    PowerOfTwo,
    Small,
    Word,
    MultiWord,
    General,
}

impl Layout {
    /// The layout used for rows of `bit_num` bits (`bit_num > 0`).
    pub fn for_bit_num(bit_num: usize) -> Self {
        if bit_num < WORD_BITS {
            if bit_num.is_power_of_two() {
                Layout::PowerOfTwo
            } else {
                Layout::Small
            }
        } else if bit_num == WORD_BITS {
            Layout::Word
        } else if bit_num % WORD_BITS == 0 {
            Layout::MultiWord
        } else {
            Layout::General
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layout::PowerOfTwo => "power-of-two",
            Layout::Small => "small",
            Layout::Word => "word",
            Layout::MultiWord => "multi-word",
            Layout::General => "general",
        };
        f.write_str(name)
    }
}

/// A packed array of fixed-width bit-vectors, specialized by width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackedArray {
    PowerOfTwo(PowerOfTwoArray),
    Small(SmallArray),
    Word(WordArray),
    MultiWord(MultiWordArray),
    General(GeneralArray),
}

macro_rules! dispatch {
    ($self:expr, $a:ident => $body:expr) => {
        match $self {
            PackedArray::PowerOfTwo($a) => $body,
            PackedArray::Small($a) => $body,
            PackedArray::Word($a) => $body,
            PackedArray::MultiWord($a) => $body,
            PackedArray::General($a) => $body,
        }
    };
}

#[derive(Serialize)]
struct ArrayRecordRef<'a> {
    data: &'a [Word],
    bit_num: u64,
    len: u64,
}

#[derive(Deserialize)]
struct ArrayRecord {
    data: Vec<Word>,
    bit_num: u64,
    len: u64,
}

impl PackedArray {
    /// An empty array of `bit_num`-bit rows. Returns `None` when `bit_num == 0`.
    pub fn new(bit_num: usize) -> Option<Self> {
        Self::from_parts(Vec::new(), bit_num, 0)
    }

    fn from_parts(data: Vec<Word>, bit_num: usize, len: usize) -> Option<Self> {
        if bit_num == 0 {
            return None;
        }
        let s = Storage::new(data, bit_num, len);
        Some(match Layout::for_bit_num(bit_num) {
            Layout::PowerOfTwo => PackedArray::PowerOfTwo(PowerOfTwoArray { s }),
            Layout::Small => PackedArray::Small(SmallArray { s }),
            Layout::Word => PackedArray::Word(WordArray { s }),
            Layout::MultiWord => PackedArray::MultiWord(MultiWordArray { s }),
            Layout::General => PackedArray::General(GeneralArray { s }),
        })
    }

    pub fn layout(&self) -> Layout {
        match self {
            PackedArray::PowerOfTwo(_) => Layout::PowerOfTwo,
            PackedArray::Small(_) => Layout::Small,
            PackedArray::Word(_) => Layout::Word,
            PackedArray::MultiWord(_) => Layout::MultiWord,
            PackedArray::General(_) => Layout::General,
        }
    }

    fn storage(&self) -> &Storage {
        dispatch!(self, a => &a.s)
    }

    /// Drop every row, keeping the buffer for reuse.
    pub fn clear(&mut self) {
        dispatch!(self, a => a.s.truncate(0))
    }

    /// Rows the current buffer holds without reallocating.
    pub fn capacity(&self) -> usize {
        self.storage().capacity()
    }

    /// Words in the backing buffer.
    pub fn capacity_words(&self) -> usize {
        self.storage().data.len()
    }

    /// Bytes held by the backing buffer.
    pub fn memory_bytes(&self) -> usize {
        self.capacity_words() * std::mem::size_of::<Word>()
    }

    /// Write `[version][record]` to `w`.
    pub fn save<W: Write>(&self, mut w: W) -> Result<()> {
        let s = self.storage();
        w.write_all(&[ARRAY_FORMAT_VERSION])?;
        bincode::serialize_into(
            &mut w,
            &ArrayRecordRef {
                data: s.live_words(),
                bit_num: s.bit_num as u64,
                len: s.len as u64,
            },
        )?;
        debug!(bit_num = s.bit_num, len = s.len, "saved packed array");
        Ok(())
    }

    /// Read an array written by [`PackedArray::save`], consuming exactly its bytes.
    pub fn load<R: Read>(mut r: R) -> Result<Self> {
        let mut version = [0u8; 1];
        r.read_exact(&mut version)?;
        match version[0] {
            1 => Self::load_v1(r),
            v => Err(Error::UnsupportedFormatVersion(v)),
        }
    }

    fn load_v1<R: Read>(r: R) -> Result<Self> {
        let record: ArrayRecord = bincode::deserialize_from(r)?;
        let bit_num = usize::try_from(record.bit_num)
            .map_err(|_| Error::InvalidRecord(format!("bit_num {}", record.bit_num)))?;
        let len = usize::try_from(record.len)
            .map_err(|_| Error::InvalidRecord(format!("len {}", record.len)))?;
        if bit_num == 0 {
            return Err(Error::InvalidRecord("bit_num must be positive".into()));
        }
        let total_bits = bit_num
            .checked_mul(len)
            .ok_or_else(|| Error::InvalidRecord(format!("{len} rows of {bit_num} bits")))?;
        let needed = total_bits.div_ceil(WORD_BITS);

        let mut data = record.data;
        if data.len() < needed {
            return Err(Error::InvalidRecord(format!(
                "{} words for {len} rows of {bit_num} bits, need {needed}",
                data.len()
            )));
        }
        data.truncate(needed);
        clear_bit_range(&mut data, total_bits, needed * WORD_BITS);

        debug!(bit_num, len, "loaded packed array");
        Self::from_parts(data, bit_num, len)
            .ok_or_else(|| Error::InvalidRecord("bit_num must be positive".into()))
    }
}

impl BitArray for PackedArray {
    fn resize(&mut self, n: usize) -> Result<()> {
        dispatch!(self, a => a.resize(n))
    }

    fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    fn bit_num(&self) -> usize {
        dispatch!(self, a => a.bit_num())
    }

    fn get(&self, n: usize) -> Result<BitVectorView<'_>> {
        dispatch!(self, a => a.get(n))
    }

    fn set(&mut self, n: usize, v: &BitVector) -> Result<()> {
        dispatch!(self, a => a.set(n, v))
    }

    fn hamming_distance(&self, n: usize, v: &BitVector) -> Result<u32> {
        dispatch!(self, a => a.hamming_distance(n, v))
    }
}
