//! Core command-tree types, contract structure checks, and structural diffing.
//!
//! This crate defines the model shared by every stage of a contract check:
//!
//! - [`CommandNode`]: one command with its flags and subcommands. The same
//!   type describes a declared contract and a tree observed from a running
//!   program.
//! - [`FlagDescriptor`]: a flag with shorthand, usage, [`FlagType`], and
//!   persistence.
//! - [`EntrypointReference`]: where the root command of the observed tree is
//!   constructed.
//!
//! Structure checks ([`check_structure`]) reject malformed contracts before
//! they are compared. The structural validator ([`validate`]) diffs a contract
//! against an observed tree and returns a [`ValidationOutcome`] listing every
//! [`Discrepancy`].
//!
//! # Example
//!
//! ```
//! use cobra_contract_core::*;
//!
//! let contract = CommandNode::new("app")
//!     .with_flag(FlagDescriptor::new("config", FlagType::String).persistent())
//!     .with_child(CommandNode::new("serve")
//!         .with_flag(FlagDescriptor::new("port", FlagType::Int).with_shorthand("p")));
//! assert!(check_structure(&contract).is_empty());
//!
//! let mut observed = contract.clone();
//! observed.children[0].flags.clear();
//!
//! let outcome = validate(&contract, &observed);
//! assert!(!outcome.valid);
//! assert_eq!(outcome.discrepancies[0].kind, DiscrepancyKind::Missing);
//! assert_eq!(outcome.discrepancies[0].path, "serve --port");
//! ```

mod structure;
mod types;
mod validate;

pub use structure::{StructureError, check_structure};
pub use types::*;
pub use validate::{
    Discrepancy, DiscrepancyKind, ROOT_PATH, ValidationOutcome, child_path, flag_path, validate,
};
