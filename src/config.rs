//! Prover configuration
//!
//! Read from a JSON file, then overridden by command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use deploy_core::ParallelSolver;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProverConfig {
    /// Solver worker threads (0: one per CPU core)
    pub threads: usize,
    /// Give up on a proof-of-work search after this many seconds
    pub timeout_secs: Option<u64>,
    /// Where `build` writes deployment files, if anywhere
    pub output_dir: Option<PathBuf>,
}

impl ProverConfig {
    /// Load a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, else `fallback` when it exists, else defaults
    pub fn load_or_default(path: Option<&Path>, fallback: &Path) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if fallback.exists() => Self::load(fallback),
            None => Ok(Self::default()),
        }
    }

    /// Effective worker count
    pub fn threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Solver set up with this config's threads and deadline
    pub fn solver(&self) -> ParallelSolver {
        let solver = ParallelSolver::new(self.threads());
        match self.timeout() {
            Some(timeout) => solver.with_deadline(timeout),
            None => solver,
        }
    }
}

/// Get the default config file path
#[cfg(feature = "cli")]
pub fn default_config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".deploy-prep").join("config.json")
}
