use rkyv::{Archive, Deserialize, Serialize};
use rkyv::util::AlignedVec;

use super::error::{StorageError, StorageResult};

/// On-disk envelope: the caller's key, its optional secondary index value, and an opaque
/// payload.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: String,
    pub index_key: Option<String>,
    pub payload: Vec<u8>,
}

impl StoredRecord {
    pub fn new(key: &str, index_key: Option<&str>, payload: Vec<u8>) -> Self {
        Self {
            key: key.to_string(),
            index_key: index_key.map(str::to_string),
            payload,
        }
    }

    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|bytes| bytes.to_vec())
            .map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })
    }

    /// Decodes bytes read from a file; the error is the rkyv validation message.
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<StoredRecord, rkyv::rancor::Error>(&aligned).map_err(|e| e.to_string())
    }
}
