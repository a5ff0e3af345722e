//! Content hashing
//!
//! Files and entity documents are keyed by a CIDv1 built from the SHA-256 of
//! their bytes:
//!
//! ```text
//! cid = multibase_base32(0x01 || RAW_CODEC || SHA2_256_CODE || 0x20 || sha256(bytes))
//! ```
//!
//! which renders as the familiar `bafkrei...` string.

use std::io::Read;

use cid::Cid;
use multihash::Multihash;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::entity::ContentFileHash;
use crate::params::{RAW_CODEC, SHA2_256_CODE};

#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to read content: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build multihash: {0}")]
    Multihash(String),
}

/// Deterministic bytes -> content hash function
///
/// Implementations must be pure: the same bytes always produce the same hash.
pub trait ContentHasher: Send + Sync {
    fn hash(&self, bytes: &[u8]) -> Result<ContentFileHash, HashError>;

    /// Hash everything a reader yields
    fn hash_reader(&self, mut reader: impl Read) -> Result<ContentFileHash, HashError>
    where
        Self: Sized,
    {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.hash(&bytes)
    }
}

impl<T: ContentHasher + ?Sized> ContentHasher for &T {
    fn hash(&self, bytes: &[u8]) -> Result<ContentFileHash, HashError> {
        (**self).hash(bytes)
    }
}

/// SHA-256 raw-leaf CIDv1 hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct CidV1Hasher;

impl CidV1Hasher {
    pub fn new() -> Self {
        Self
    }
}

impl ContentHasher for CidV1Hasher {
    fn hash(&self, bytes: &[u8]) -> Result<ContentFileHash, HashError> {
        let digest = Sha256::digest(bytes);
        let mh = Multihash::<64>::wrap(SHA2_256_CODE, &digest)
            .map_err(|e| HashError::Multihash(e.to_string()))?;
        Ok(ContentFileHash::new(Cid::new_v1(RAW_CODEC, mh).to_string()))
    }
}

/// Convenience function for one-off hashing with the default hasher
pub fn hash_content(bytes: &[u8]) -> Result<ContentFileHash, HashError> {
    CidV1Hasher.hash(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_shape() {
        let hash = hash_content(b"hello").unwrap();
        // CIDv1 + raw + sha2-256 always renders with this prefix
        assert!(hash.as_str().starts_with("bafkrei"), "{hash}");
        assert_eq!(hash.as_str().len(), 59);
    }

    #[test]
    fn test_known_vector() {
        // Empty input, as produced by `ipfs add --cid-version 1 --raw-leaves`
        let hash = hash_content(b"").unwrap();
        assert_eq!(
            hash.as_str(),
            "bafkreihdwdcefgh4dqkjv67uzcmw7ojee6xedzdetojuzjevtenxquvyku"
        );
    }

    #[test]
    fn test_reader_matches_slice() {
        let data = vec![7u8; 4096];
        let from_slice = CidV1Hasher.hash(&data).unwrap();
        let from_reader = CidV1Hasher.hash_reader(&data[..]).unwrap();
        assert_eq!(from_slice, from_reader);
    }
}
