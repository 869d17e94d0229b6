//! Error types for contract and configuration loading.
//!
//! Covers a missing contract file, undecodable contents, and contracts that
//! decode but fail structure checks.

use std::path::PathBuf;

use cobra_contract_core::StructureError;
use thiserror::Error;

/// Errors that can occur while loading a contract or project config.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Contract file does not exist.
    #[error("contract not found: {}", .0.display())]
    ContractNotFound(PathBuf),

    /// Contract file could not be read or decoded.
    #[error("failed to parse contract '{}': {message}", .path.display())]
    ContractParseError { path: PathBuf, message: String },

    /// Contract decoded but is structurally invalid.
    #[error("invalid contract '{}': {}", .path.display(), join_errors(.errors))]
    InvalidContract {
        path: PathBuf,
        errors: Vec<StructureError>,
    },

    /// File I/O failure outside contract parsing.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

fn join_errors(errors: &[StructureError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias for results with [`LoaderError`].
pub type Result<T> = std::result::Result<T, LoaderError>;
