//! Entity data model
//!
//! An entity is the immutable, hash-identified document describing a
//! deployable unit: the pointers it claims, the files it references and an
//! arbitrary metadata value.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical slot an entity occupies (scene coordinate, profile address, ...)
pub type Pointer = String;

/// Milliseconds since the Unix epoch
pub type Timestamp = u64;

/// Schema-agnostic entity metadata
pub type EntityMetadata = serde_json::Value;

/// Content hash identifying a byte sequence in the store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFileHash(String);

impl ContentFileHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ContentFileHash {
    fn from(hash: String) -> Self {
        Self(hash)
    }
}

impl From<&str> for ContentFileHash {
    fn from(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

/// Entity ids are content hashes of the entity document
pub type EntityId = ContentFileHash;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown entity type: {0}")]
pub struct UnknownEntityType(pub String);

/// Kind of deployable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Scene,
    Profile,
    Wearable,
    Store,
    Emote,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Scene => "scene",
            EntityType::Profile => "profile",
            EntityType::Wearable => "wearable",
            EntityType::Store => "store",
            EntityType::Emote => "emote",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scene" => Ok(EntityType::Scene),
            "profile" => Ok(EntityType::Profile),
            "wearable" => Ok(EntityType::Wearable),
            "store" => Ok(EntityType::Store),
            "emote" => Ok(EntityType::Emote),
            _ => Err(UnknownEntityType(s.to_string())),
        }
    }
}

/// Entity document format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityVersion {
    V2,
    V3,
}

impl EntityVersion {
    /// Version written by every build
    pub const CURRENT: EntityVersion = EntityVersion::V3;
}

/// A file referenced by an entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityContentItemReference {
    /// File name as the caller wrote it
    pub file: String,
    /// Content hash of the file bytes
    pub hash: ContentFileHash,
}

/// The hashed part of an entity
///
/// Field declaration order is the byte order of the canonical encoding and
/// must not change: entity ids are computed over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    pub version: EntityVersion,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub pointers: Vec<Pointer>,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<EntityContentItemReference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EntityMetadata>,
}

/// An entity document together with its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(flatten)]
    pub document: EntityDocument,
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        self.document.entity_type
    }

    pub fn pointers(&self) -> &[Pointer] {
        &self.document.pointers
    }

    pub fn timestamp(&self) -> Timestamp {
        self.document.timestamp
    }

    pub fn content(&self) -> &[EntityContentItemReference] {
        self.document.content.as_deref().unwrap_or_default()
    }

    pub fn metadata(&self) -> Option<&EntityMetadata> {
        self.document.metadata.as_ref()
    }
}

/// Everything a signer needs: the id to sign plus every file to upload,
/// the entity document included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPreparationData {
    pub entity_id: EntityId,
    pub files: BTreeMap<ContentFileHash, Vec<u8>>,
}

impl DeploymentPreparationData {
    /// Raw entity document bytes
    pub fn entity_file(&self) -> Option<&[u8]> {
        self.files.get(&self.entity_id).map(Vec::as_slice)
    }

    /// Attach the signature chain produced by an external signer
    pub fn with_auth_chain(self, auth_chain: AuthChain) -> DeploymentData {
        DeploymentData {
            entity_id: self.entity_id,
            files: self.files,
            auth_chain,
        }
    }
}

/// One link of an authorization chain
///
/// Produced by the signer; carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthLink {
    #[serde(rename = "type")]
    pub link_type: String,
    pub payload: String,
    #[serde(default)]
    pub signature: String,
}

pub type AuthChain = Vec<AuthLink>;

/// A signed deployment ready for the transport layer
///
/// File contents are hex encoded when serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentData {
    pub entity_id: EntityId,
    #[serde(with = "hex_files")]
    pub files: BTreeMap<ContentFileHash, Vec<u8>>,
    pub auth_chain: AuthChain,
}

mod hex_files {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::ContentFileHash;

    pub fn serialize<S: Serializer>(
        files: &BTreeMap<ContentFileHash, Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let encoded: BTreeMap<&ContentFileHash, String> =
            files.iter().map(|(k, v)| (k, hex::encode(v))).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<ContentFileHash, Vec<u8>>, D::Error> {
        let encoded = BTreeMap::<ContentFileHash, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| hex::decode(&v).map(|bytes| (k, bytes)).map_err(D::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_parsing() {
        assert_eq!("scene".parse::<EntityType>().unwrap(), EntityType::Scene);
        assert_eq!("PROFILE".parse::<EntityType>().unwrap(), EntityType::Profile);
        assert!("island".parse::<EntityType>().is_err());
    }

    #[test]
    fn test_entity_serializes_id_first() {
        let entity = Entity {
            id: ContentFileHash::new("bafkreiid"),
            document: EntityDocument {
                version: EntityVersion::V3,
                entity_type: EntityType::Scene,
                pointers: vec!["0,0".to_string()],
                timestamp: 1,
                content: None,
                metadata: None,
            },
        };
        let json = serde_json::to_string(&entity).unwrap();
        assert_eq!(
            json,
            r#"{"id":"bafkreiid","version":"v3","type":"scene","pointers":["0,0"],"timestamp":1}"#
        );
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entity);
    }

    #[test]
    fn test_deployment_data_hex_files() {
        let mut files = BTreeMap::new();
        files.insert(ContentFileHash::new("h1"), vec![0xde, 0xad]);
        let prepared = DeploymentPreparationData {
            entity_id: ContentFileHash::new("h1"),
            files,
        };
        assert_eq!(prepared.entity_file(), Some(&[0xde, 0xad][..]));

        let data = prepared.with_auth_chain(vec![AuthLink {
            link_type: "SIGNER".to_string(),
            payload: "0xabc".to_string(),
            signature: String::new(),
        }]);
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["files"]["h1"], "dead");
        assert_eq!(json["auth_chain"][0]["type"], "SIGNER");

        let back: DeploymentData = serde_json::from_value(json).unwrap();
        assert_eq!(back, data);
    }
}
