//! Contract file loading.
//!
//! A contract is a [`CommandNode`] tree stored as JSON or YAML, using the same
//! field names the introspection program emits:
//!
//! ```yaml
//! name: app
//! shortDescription: Example application
//! flags:
//!   - name: config
//!     shorthand: c
//!     usage: config file path
//!     type: string
//!     persistent: true
//! children:
//!   - name: serve
//!     flags:
//!       - { name: port, type: int }
//! ```
//!
//! Every loaded contract passes [`check_structure`] before it is returned, so
//! callers never see a tree with empty names, duplicate flags, or flag types
//! outside the enumerated set.

use std::path::Path;

use cobra_contract_core::{CommandNode, check_structure};
use tracing::debug;

use crate::error::{LoaderError, Result};

/// On-disk contract encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractFormat {
    Json,
    Yaml,
}

impl ContractFormat {
    /// Picks a format from the file extension. Unknown extensions read as
    /// JSON.
    ///
    /// # Examples
    ///
    /// ```
    /// use cobra_contract_loader::ContractFormat;
    ///
    /// assert_eq!(ContractFormat::from_path("cli.yml"), ContractFormat::Yaml);
    /// assert_eq!(ContractFormat::from_path("cli.YAML"), ContractFormat::Yaml);
    /// assert_eq!(ContractFormat::from_path("cli.json"), ContractFormat::Json);
    /// assert_eq!(ContractFormat::from_path("contract"), ContractFormat::Json);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

/// Loads and structure-checks a contract file.
///
/// # Errors
///
/// Returns [`LoaderError::ContractNotFound`] if `path` does not exist,
/// [`LoaderError::ContractParseError`] if it cannot be read or decoded, and
/// [`LoaderError::InvalidContract`] if the decoded tree fails structure
/// checks.
pub fn load_contract(path: impl AsRef<Path>) -> Result<CommandNode> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoaderError::ContractNotFound(path.to_path_buf()));
    }

    let raw = std::fs::read_to_string(path).map_err(|err| LoaderError::ContractParseError {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let format = ContractFormat::from_path(path);
    debug!(path = %path.display(), ?format, bytes = raw.len(), "Loading contract");
    parse_contract(&raw, format, path)
}

/// Decodes and structure-checks contract text.
///
/// `origin` is only used to label errors.
///
/// # Examples
///
/// ```
/// use cobra_contract_loader::{ContractFormat, parse_contract};
///
/// let contract = parse_contract(
///     r#"{"name": "app", "flags": [{"name": "verbose", "type": "bool"}]}"#,
///     ContractFormat::Json,
///     "inline.json",
/// )
/// .unwrap();
/// assert_eq!(contract.flags[0].name, "verbose");
/// ```
pub fn parse_contract(
    raw: &str,
    format: ContractFormat,
    origin: impl AsRef<Path>,
) -> Result<CommandNode> {
    let origin = origin.as_ref();
    let decoded: std::result::Result<CommandNode, String> = match format {
        ContractFormat::Json => serde_json::from_str(raw).map_err(|e| e.to_string()),
        ContractFormat::Yaml => serde_yaml::from_str(raw).map_err(|e| e.to_string()),
    };
    let contract = decoded.map_err(|message| LoaderError::ContractParseError {
        path: origin.to_path_buf(),
        message,
    })?;

    let errors = check_structure(&contract);
    if !errors.is_empty() {
        return Err(LoaderError::InvalidContract {
            path: origin.to_path_buf(),
            errors,
        });
    }

    debug!(
        path = %origin.display(),
        commands = contract.node_count(),
        "Contract accepted"
    );
    Ok(contract)
}
