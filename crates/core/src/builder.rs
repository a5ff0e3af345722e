//! Entity & file assembly
//!
//! Hashes the files a deployment uploads, builds the entity that references
//! them and returns everything keyed by content hash, entity document
//! included. The entity id is what the external signer signs.

use std::collections::BTreeMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::canonical::canonicalize;
use crate::clock::{Clock, SystemClock};
use crate::entity::{
    ContentFileHash, DeploymentPreparationData, Entity, EntityContentItemReference,
    EntityDocument, EntityId, EntityMetadata, EntityType, Pointer, Timestamp,
};
use crate::error::BuildError;
use crate::hasher::{CidV1Hasher, ContentHasher, HashError};

/// A file to upload: name as referenced by the entity, and its bytes
pub type NamedFile = (String, Vec<u8>);

/// A previously uploaded file: name and known content hash
pub type NamedHash = (String, ContentFileHash);

/// Builds entities and their deployment file sets
///
/// Stateless apart from the injected hasher and clock; one builder can serve
/// concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct DeploymentBuilder<H = CidV1Hasher, C = SystemClock> {
    hasher: H,
    clock: C,
}

impl DeploymentBuilder {
    /// Builder with the CIDv1 hasher and the wall clock
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: ContentHasher, C: Clock> DeploymentBuilder<H, C> {
    pub fn with_hasher<H2: ContentHasher>(self, hasher: H2) -> DeploymentBuilder<H2, C> {
        DeploymentBuilder {
            hasher,
            clock: self.clock,
        }
    }

    pub fn with_clock<C2: Clock>(self, clock: C2) -> DeploymentBuilder<H, C2> {
        DeploymentBuilder {
            hasher: self.hasher,
            clock,
        }
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Build the entity document, serialize it and derive its id
    ///
    /// Lowest-level primitive: callers that already know their content
    /// hashes can use it directly.
    pub fn build_entity_and_file(
        &self,
        entity_type: EntityType,
        pointers: Vec<Pointer>,
        timestamp: Timestamp,
        content: Option<Vec<EntityContentItemReference>>,
        metadata: Option<EntityMetadata>,
    ) -> Result<(Entity, Vec<u8>), BuildError> {
        let (document, entity_file) =
            canonicalize(entity_type, pointers, timestamp, content, metadata)?;
        let id = self.hasher.hash(&entity_file)?;

        debug!(entity_id = %id, bytes = entity_file.len(), "built entity");

        Ok((Entity { id, document }, entity_file))
    }

    /// Build an entity from raw file contents
    ///
    /// Every file is hashed (concurrently with the `parallel` feature) and
    /// referenced under its name in input order. The timestamp defaults to
    /// the builder's clock.
    pub fn build_entity(
        &self,
        entity_type: EntityType,
        pointers: Vec<Pointer>,
        files: impl IntoIterator<Item = NamedFile>,
        metadata: Option<EntityMetadata>,
        timestamp: Option<Timestamp>,
    ) -> Result<DeploymentPreparationData, BuildError> {
        if pointers.is_empty() {
            return Err(BuildError::InvalidPointerSet);
        }

        let hashed = self.hash_files(files.into_iter().collect())?;

        let mut hashes_by_key = Vec::with_capacity(hashed.len());
        let mut files_by_hash = BTreeMap::new();
        for (key, hash, content) in hashed {
            hashes_by_key.push((key, hash.clone()));
            files_by_hash.insert(hash, content);
        }

        self.assemble(
            entity_type,
            pointers,
            hashes_by_key,
            files_by_hash,
            metadata,
            timestamp,
        )
    }

    /// Build an entity that only references content uploaded before
    ///
    /// Used to re-point an entity at existing files; the returned file set
    /// holds just the entity document.
    pub fn build_entity_without_new_files(
        &self,
        entity_type: EntityType,
        pointers: Vec<Pointer>,
        hashes_by_key: impl IntoIterator<Item = NamedHash>,
        metadata: Option<EntityMetadata>,
        timestamp: Option<Timestamp>,
    ) -> Result<DeploymentPreparationData, BuildError> {
        self.assemble(
            entity_type,
            pointers,
            hashes_by_key.into_iter().collect(),
            BTreeMap::new(),
            metadata,
            timestamp,
        )
    }

    /// Check a received entity file against the id it was published under
    pub fn verify_entity_file(&self, id: &EntityId, entity_file: &[u8]) -> Result<Entity, BuildError> {
        let actual = self.hasher.hash(entity_file)?;
        if &actual != id {
            return Err(BuildError::EntityIdMismatch {
                expected: id.clone(),
                actual,
            });
        }

        let document: EntityDocument = serde_json::from_slice(entity_file)?;
        Ok(Entity { id: actual, document })
    }

    fn assemble(
        &self,
        entity_type: EntityType,
        pointers: Vec<Pointer>,
        hashes_by_key: Vec<NamedHash>,
        mut files_by_hash: BTreeMap<ContentFileHash, Vec<u8>>,
        metadata: Option<EntityMetadata>,
        timestamp: Option<Timestamp>,
    ) -> Result<DeploymentPreparationData, BuildError> {
        if pointers.is_empty() {
            return Err(BuildError::InvalidPointerSet);
        }

        let content = hashes_by_key
            .into_iter()
            .map(|(file, hash)| EntityContentItemReference { file, hash })
            .collect();

        let timestamp = timestamp.unwrap_or_else(|| self.clock.now_millis());

        let (entity, entity_file) =
            self.build_entity_and_file(entity_type, pointers, timestamp, Some(content), metadata)?;

        files_by_hash.insert(entity.id.clone(), entity_file);

        Ok(DeploymentPreparationData {
            entity_id: entity.id,
            files: files_by_hash,
        })
    }

    /// Hash all files concurrently, keeping input order in the result
    #[cfg(feature = "parallel")]
    fn hash_files(
        &self,
        files: Vec<NamedFile>,
    ) -> Result<Vec<(String, ContentFileHash, Vec<u8>)>, HashError> {
        files
            .into_par_iter()
            .map(|(key, content)| self.hash_file(key, content))
            .collect()
    }

    /// Hash all files one after another (sequential fallback)
    #[cfg(not(feature = "parallel"))]
    fn hash_files(
        &self,
        files: Vec<NamedFile>,
    ) -> Result<Vec<(String, ContentFileHash, Vec<u8>)>, HashError> {
        files
            .into_iter()
            .map(|(key, content)| self.hash_file(key, content))
            .collect()
    }

    fn hash_file(
        &self,
        key: String,
        content: Vec<u8>,
    ) -> Result<(String, ContentFileHash, Vec<u8>), HashError> {
        let hash = self.hasher.hash(&content)?;
        debug!(file = %key, hash = %hash, bytes = content.len(), "hashed file");
        Ok((key, hash, content))
    }
}
