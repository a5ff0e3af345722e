//! Error types for entity building

use thiserror::Error;

use crate::entity::EntityId;
use crate::hasher::HashError;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("All entities must have at least one pointer")]
    InvalidPointerSet,

    /// The store treats file names case-insensitively, so `a.png` and `A.png` collide
    #[error("File name {0:?} is repeated (file names are case insensitive)")]
    DuplicateFileName(String),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("Invalid entity document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Entity file hashes to {actual}, expected {expected}")]
    EntityIdMismatch { expected: EntityId, actual: EntityId },
}
