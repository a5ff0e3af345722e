//! Deployment Preparation Library
//!
//! Turns a set of files into a signed-ready catalyst deployment and solves
//! the proof-of-work challenges an authorization server may require first.
//!
//! # Overview
//!
//! A deployment is an entity document plus every file it references, all
//! keyed by content hash. The entity id (the hash of the document) is what
//! the deployer signs.
//!
//! # Example
//!
//! ```rust
//! use deploy::{DeploymentBuilder, EntityType};
//!
//! let prepared = DeploymentBuilder::new()
//!     .build_entity(
//!         EntityType::Scene,
//!         vec!["0,0".to_string()],
//!         vec![("scene.json".to_string(), b"{}".to_vec())],
//!         None,
//!         Some(1_700_000_000_000),
//!     )
//!     .unwrap();
//!
//! println!("Sign this entity id: {}", prepared.entity_id);
//! ```

pub mod config;
pub mod files;
pub mod solver;

// Re-export the core algorithms
pub use deploy_core::*;
