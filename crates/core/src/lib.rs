//! # Deploy Core
//!
//! Everything with algorithmic content in preparing a deployment for a
//! content-addressed catalyst store.
//!
//! ## Entities
//!
//! An entity is a JSON document listing the pointers it claims, the files it
//! references (by content hash) and free-form metadata. Its id is the content
//! hash of its own canonical bytes, so the id can only be reproduced from the
//! exact same document:
//!
//! ```text
//! {"version":"v3","type":"scene","pointers":[...],"timestamp":...,"content":[...],"metadata":...}
//! ```
//!
//! ## Proof of work
//!
//! Before accepting a deployment, an authorization server may ask for a nonce
//! such that `sha256(challenge || nonce)` starts with a number of zero hex
//! digits. Each extra digit multiplies the expected work by 16.
//!
//! ## Example
//!
//! ```rust
//! use deploy_core::{DeploymentBuilder, EntityType, FixedClock, PowChallenge, pow};
//!
//! let builder = DeploymentBuilder::new().with_clock(FixedClock(1000));
//! let prepared = builder
//!     .build_entity(
//!         EntityType::Profile,
//!         vec!["0xabc".to_string()],
//!         vec![("body.png".to_string(), b"png bytes".to_vec())],
//!         None,
//!         None,
//!     )
//!     .unwrap();
//! assert!(prepared.files.contains_key(&prepared.entity_id));
//!
//! let challenge = PowChallenge::new("c0ffee", 1).unwrap();
//! let nonce = pow::solve(&challenge);
//! assert!(pow::verify(&challenge, nonce.as_str()));
//! ```

mod builder;
mod canonical;
mod clock;
mod entity;
mod error;
mod hasher;
mod params;
pub mod pow;

pub use builder::{DeploymentBuilder, NamedFile, NamedHash};
pub use canonical::{canonicalize, to_canonical_bytes};
pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::{
    AuthChain, AuthLink, ContentFileHash, DeploymentData, DeploymentPreparationData, Entity,
    EntityContentItemReference, EntityDocument, EntityId, EntityMetadata, EntityType,
    EntityVersion, Pointer, Timestamp, UnknownEntityType,
};
pub use error::BuildError;
pub use hasher::{CidV1Hasher, ContentHasher, HashError, hash_content};
pub use params::*;
pub use pow::{ChallengeResponse, Nonce, ParallelSolver, PowChallenge, PowError, Solution};
