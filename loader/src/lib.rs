//! Contract loading and project configuration.
//!
//! This crate turns files on disk into the inputs of a contract check:
//!
//! - [`load_contract`] reads a JSON or YAML contract and rejects trees that
//!   fail [`check_structure`](cobra_contract_core::check_structure).
//! - [`ProjectConfig`] reads the optional `.cobra-contract.yml` that stores
//!   per-project defaults (contract path, entrypoint, time limits).
//!
//! # Quick start
//!
//! ```no_run
//! use cobra_contract_loader::{ProjectConfig, load_contract};
//!
//! let config = ProjectConfig::discover("path/to/project").unwrap();
//! let contract_path = config
//!     .contract_path("path/to/project")
//!     .unwrap_or_else(|| "cli-contract.yaml".into());
//! let contract = load_contract(contract_path).unwrap();
//! println!("contract declares {} commands", contract.node_count());
//! ```

mod config;
mod error;
mod loader;

pub use config::{PROJECT_CONFIG_FILE, ProjectConfig};
pub use error::{LoaderError, Result};
pub use loader::{ContractFormat, load_contract, parse_contract};
