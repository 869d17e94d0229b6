//! Per-project configuration for contract checks.
//!
//! A project may carry a `.cobra-contract.yml` at its root so that repeated
//! checks need no command-line arguments. Every field is optional; values
//! given on the command line take precedence.
//!
//! # Example YAML
//!
//! ```yaml
//! contract: contracts/cli.yaml
//! entrypoint: main.NewRootCmd
//! timeout_secs: 120
//! grace_secs: 5
//! go_binary: /usr/local/go/bin/go
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Conventional config file name, looked up in the project root.
pub const PROJECT_CONFIG_FILE: &str = ".cobra-contract.yml";

/// Project-level defaults for a contract check.
///
/// # Examples
///
/// ```
/// # use cobra_contract_loader::ProjectConfig;
/// let config: ProjectConfig = serde_yaml::from_str("entrypoint: main.NewRootCmd\ntimeout_secs: 0\n").unwrap();
/// assert_eq!(config.entrypoint.as_deref(), Some("main.NewRootCmd"));
/// assert_eq!(config.timeout(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Contract path, relative to the project root unless absolute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<PathBuf>,
    /// Entrypoint reference (`main.NewRootCmd`, `pkg/cmd.Root`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    /// Overall time limit for toolchain invocations; `0` disables it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Wait between interrupt and kill once the time limit expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_secs: Option<u64>,
    /// Go toolchain binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_binary: Option<PathBuf>,
}

impl ProjectConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::LoaderError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::LoaderError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Loads `.cobra-contract.yml` from `project_root` if present.
    ///
    /// Returns the default (empty) config when the file does not exist.
    pub fn discover(project_root: impl AsRef<Path>) -> Result<Self> {
        let path = project_root.as_ref().join(PROJECT_CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        debug!(path = %path.display(), "Loading project config");
        Self::load(path)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Time limit, with `0` meaning none.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Resolves the contract path against `project_root`.
    pub fn contract_path(&self, project_root: impl AsRef<Path>) -> Option<PathBuf> {
        self.contract.as_ref().map(|contract| {
            if contract.is_absolute() {
                contract.clone()
            } else {
                project_root.as_ref().join(contract)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
contract: contracts/cli.yaml
entrypoint: main.NewRootCmd
timeout_secs: 90
grace_secs: 3
go_binary: /opt/go/bin/go
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: ProjectConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.contract, Some(PathBuf::from("contracts/cli.yaml")));
        assert_eq!(config.entrypoint.as_deref(), Some("main.NewRootCmd"));
        assert_eq!(config.timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.grace_secs, Some(3));
        assert_eq!(config.go_binary, Some(PathBuf::from("/opt/go/bin/go")));
    }

    #[test]
    fn test_deserialize_empty_document() {
        let config: ProjectConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_contract_path_is_relative_to_project() {
        let config: ProjectConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(
            config.contract_path("/work/app"),
            Some(PathBuf::from("/work/app/contracts/cli.yaml"))
        );
    }

    #[test]
    fn test_discover_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::discover(dir.path()).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_CONFIG_FILE);

        let original: ProjectConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = ProjectConfig::discover(dir.path()).unwrap();
        assert_eq!(loaded, original);
    }
}
