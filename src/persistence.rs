//! Binary save/load for [`EuclidLsh`].
//!
//! Layout: `[version: u8][bincode {format_version, norms}][packed-array bytes]`.
//! The packed array carries its own version byte and record; nothing separates
//! the two parts because each decoder consumes exactly its own bytes.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::array::{BitArray, PackedArray};
use crate::error::{Error, Result};
use crate::index::EuclidLsh;

const INDEX_FORMAT_VERSION: u8 = 1;

#[derive(Serialize)]
struct IndexRecordRef<'a> {
    format_version: u8,
    norms: &'a [f32],
}

#[derive(Deserialize)]
struct IndexRecord {
    format_version: u8,
    norms: Vec<f32>,
}

impl EuclidLsh {
    /// Serialize the index to `w`.
    pub fn save<W: Write>(&self, mut w: W) -> Result<()> {
        w.write_all(&[INDEX_FORMAT_VERSION])?;
        bincode::serialize_into(
            &mut w,
            &IndexRecordRef {
                format_version: INDEX_FORMAT_VERSION,
                norms: &self.norms,
            },
        )?;
        self.sketches.save(&mut w)?;
        debug!(rows = self.len(), hash_num = self.hash_num(), "saved lsh index");
        Ok(())
    }

    /// Deserialize an index written by [`EuclidLsh::save`].
    pub fn load<R: Read>(mut r: R) -> Result<Self> {
        let mut version = [0u8; 1];
        r.read_exact(&mut version)?;
        match version[0] {
            1 => Self::load_v1(r),
            v => Err(Error::UnsupportedFormatVersion(v)),
        }
    }

    fn load_v1<R: Read>(mut r: R) -> Result<Self> {
        let record: IndexRecord = bincode::deserialize_from(&mut r)?;
        if record.format_version != INDEX_FORMAT_VERSION {
            return Err(Error::UnsupportedFormatVersion(record.format_version));
        }
        let sketches = PackedArray::load(&mut r)?;
        let index = Self::from_parts(sketches, record.norms)?;
        debug!(rows = index.len(), hash_num = index.sketches.bit_num(), "loaded lsh index");
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureVector;

    fn sample_index(hash_num: usize) -> EuclidLsh {
        let mut index = EuclidLsh::builder().hash_num(hash_num).build().unwrap();
        for id in 1..=25 {
            let fv = FeatureVector::from([
                ("a", id as f32),
                ("b", (id % 7) as f32 - 3.0),
                ("c", 1.0 / id as f32),
            ]);
            index.set_row(id, &fv).unwrap();
        }
        index
    }

    #[test]
    fn test_round_trip() {
        for hash_num in [8, 13, 64, 100, 128] {
            let index = sample_index(hash_num);
            let mut buf = Vec::new();
            index.save(&mut buf).unwrap();

            let loaded = EuclidLsh::load(buf.as_slice()).unwrap();
            assert_eq!(loaded, index);
            assert_eq!(loaded.hash_num(), hash_num);

            let q = FeatureVector::from([("a", 4.0), ("b", 1.0)]);
            assert_eq!(
                loaded.query_by_vector(&q, 5).unwrap(),
                index.query_by_vector(&q, 5).unwrap()
            );
        }
    }

    #[test]
    fn test_round_trip_empty() {
        let index = EuclidLsh::builder().hash_num(32).build().unwrap();
        let mut buf = Vec::new();
        index.save(&mut buf).unwrap();
        let loaded = EuclidLsh::load(buf.as_slice()).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.hash_num(), 32);
    }

    #[test]
    fn test_unknown_version() {
        let mut buf = Vec::new();
        sample_index(16).save(&mut buf).unwrap();
        buf[0] = 99;
        assert!(matches!(
            EuclidLsh::load(buf.as_slice()),
            Err(Error::UnsupportedFormatVersion(99))
        ));
    }

    #[test]
    fn test_unknown_array_version() {
        let index = EuclidLsh::builder().hash_num(16).build().unwrap();
        let mut buf = Vec::new();
        index.save(&mut buf).unwrap();
        // Empty norms: version byte, format_version, u64 length, then the array.
        let array_start = 1 + 1 + 8;
        assert_eq!(buf[array_start], 1);
        buf[array_start] = 7;
        assert!(matches!(
            EuclidLsh::load(buf.as_slice()),
            Err(Error::UnsupportedFormatVersion(7))
        ));
    }

    #[test]
    fn test_truncated() {
        let mut buf = Vec::new();
        sample_index(64).save(&mut buf).unwrap();
        buf.truncate(buf.len() / 2);
        assert!(matches!(EuclidLsh::load(buf.as_slice()), Err(Error::Io(_))));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let mut buf = vec![INDEX_FORMAT_VERSION];
        bincode::serialize_into(
            &mut buf,
            &IndexRecordRef {
                format_version: INDEX_FORMAT_VERSION,
                norms: &[1.0, 2.0],
            },
        )
        .unwrap();
        PackedArray::new(16).unwrap().save(&mut buf).unwrap();
        assert!(matches!(
            EuclidLsh::load(buf.as_slice()),
            Err(Error::InvalidRecord(_))
        ));
    }

    /// Accepts `room` bytes, then reports the sink as gone.
    struct ClosingSink {
        room: usize,
    }

    impl Write for ClosingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.room == 0 {
                return Err(std::io::ErrorKind::ConnectionReset.into());
            }
            let n = buf.len().min(self.room);
            self.room -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_save_write_failure_keeps_kind() {
        let index = sample_index(100);
        let mut full = Vec::new();
        index.save(&mut full).unwrap();
        let norms_end = 1 + 1 + 8 + 4 * index.len();

        // Version byte, norms record, array version byte, array record.
        for room in [0, 3, norms_end, norms_end + 4, full.len() - 1] {
            match index.save(ClosingSink { room }) {
                Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
                other => panic!("room {room}: expected Io error, got {other:?}"),
            }
        }
    }
}
