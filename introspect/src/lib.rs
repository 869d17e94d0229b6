//! Command-tree introspection for Go/cobra programs.
//!
//! This crate recovers the command tree a cobra CLI actually builds and
//! checks it against a declared contract. It never parses Go source beyond
//! a few conventional patterns; instead it synthesizes a small Go program
//! that calls the project's root-command constructor and reports the tree
//! as JSON.
//!
//! # Pipeline
//!
//! 1. [`resolve_entrypoint`] parses `main.NewRootCmd` or
//!    `example.com/app/cmd.NewRootCmd`.
//! 2. [`synthesize::synthesize_program`] renders the introspection program.
//! 3. [`Inspector::execute`] builds and runs it in an ephemeral module with a
//!    time limit ([`engine`]).
//! 4. [`decode_tree`] turns its stdout into a
//!    [`CommandNode`](cobra_contract_core::CommandNode).
//! 5. [`orchestrate`] loads the contract and diffs the trees.
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use cobra_contract_introspect::{
//!     ContractCheck, GoToolchain, InspectConfig, Inspector, orchestrate,
//! };
//!
//! let inspector = Inspector::new(GoToolchain::default(), InspectConfig::default());
//! let report = orchestrate(
//!     &inspector,
//!     &ContractCheck {
//!         project: PathBuf::from("path/to/project"),
//!         contract: PathBuf::from("path/to/project/cli-contract.yaml"),
//!         entrypoint: "main.NewRootCmd".to_string(),
//!         timeout: None,
//!     },
//! )
//! .unwrap();
//! for d in &report.discrepancies {
//!     println!("{}: {} ({})", d.kind, d.path, d.message);
//! }
//! ```

pub mod decode;
pub mod engine;
pub mod entrypoint;
pub mod error;
pub mod orchestrate;
pub mod output;
pub mod process;
pub mod synthesize;
pub mod toolchain;
pub mod workspace;

pub use decode::decode_tree;
pub use engine::{InspectConfig, Inspector};
pub use entrypoint::{TARGET_IMPORT_ALIAS, resolve_entrypoint};
pub use error::{IntrospectError, OrchestrateError, Result};
pub use orchestrate::{CheckReport, ContractCheck, orchestrate};
pub use output::{OutputFormat, format_report, format_tree};
pub use process::{DEFAULT_GRACE_PERIOD, RunLimits};
pub use toolchain::{DEFAULT_GO_BINARY, GoToolchain, ResolveMode, ToolOutput, Toolchain};
