use thiserror::Error;

use crate::index::RowId;

/// Errors returned by packed arrays and the LSH index.
#[derive(Debug, Error)]
pub enum Error {
    #[error("index out of range: {index} (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("bit width mismatch: expected {expected}, got {got}")]
    BitWidthMismatch { expected: usize, got: usize },

    #[error("unsupported format version: {0}")]
    UnsupportedFormatVersion(u8),

    #[error("invalid row id: {0} (row ids start at 1)")]
    InvalidRowId(RowId),

    #[error("hash_num must be greater than 0, got {0}")]
    InvalidHashNum(usize),

    #[error("capacity overflow: {rows} rows of {bit_num} bits cannot be allocated")]
    CapacityOverflow { rows: usize, bit_num: usize },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        // I/O failures inside the codec are surfaced as-is.
        match *e {
            bincode::ErrorKind::Io(io) => Error::Io(io),
            other => Error::Serialization(other.to_string()),
        }
    }
}

/// A specialized Result type for packed-array and index operations.
pub type Result<T> = std::result::Result<T, Error>;
