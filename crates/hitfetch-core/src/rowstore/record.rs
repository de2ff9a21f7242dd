//! Stored row records.

use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

use super::lookup::Row;
use crate::error::Error;

/// A stored row with write metadata.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct RowRecord {
    /// Row columns as a JSON object.
    pub data: Vec<u8>,

    /// Write timestamp in microseconds since Unix epoch.
    pub written_at: u64,

    /// Whether this record is a tombstone.
    pub deleted: bool,
}

impl RowRecord {
    /// Encode a row with the current timestamp.
    pub fn new(row: &Row) -> Result<Self, Error> {
        let data = serde_json::to_vec(row).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Self {
            data,
            written_at: current_timestamp(),
            deleted: false,
        })
    }

    /// A tombstone for a deleted row.
    pub fn tombstone() -> Self {
        Self {
            data: Vec::new(),
            written_at: current_timestamp(),
            deleted: true,
        }
    }

    /// Decode the row columns.
    pub fn row(&self) -> Result<Row, Error> {
        serde_json::from_slice(&self.data).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    ///
    /// sled hands out values without alignment guarantees, so the bytes are
    /// copied into an aligned buffer first.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_roundtrip() {
        let row = json!({"id": "1", "author": "kim"}).as_object().cloned().unwrap();
        let record = RowRecord::new(&row).unwrap();
        let decoded = RowRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();

        assert_eq!(decoded, record);
        assert_eq!(decoded.row().unwrap(), row);
        assert!(decoded.written_at > 0);
    }

    #[test]
    fn test_tombstone() {
        let tombstone = RowRecord::tombstone();
        assert!(tombstone.deleted);
        assert!(tombstone.data.is_empty());
    }
}
