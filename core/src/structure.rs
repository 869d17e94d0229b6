//! Contract structure checks.
//!
//! A contract tree must be well-formed before it is diffed against an
//! observed tree: every command needs a name, and names and shorthands must be
//! unique within their scope. These checks catch authoring mistakes that would
//! otherwise show up as confusing discrepancies.
//!
//! # Examples
//!
//! ```
//! use cobra_contract_core::*;
//!
//! let contract = CommandNode::new("app")
//!     .with_flag(FlagDescriptor::new("verbose", FlagType::Bool).with_shorthand("v"));
//! assert!(check_structure(&contract).is_empty());
//!
//! // Invalid: two flags share a shorthand
//! let bad = contract
//!     .clone()
//!     .with_flag(FlagDescriptor::new("version", FlagType::Bool).with_shorthand("v"));
//! assert!(!check_structure(&bad).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{CommandNode, FlagDescriptor, ROOT_PATH, child_path, flag_path};

/// Contract structure errors.
///
/// Every variant carries the command path the problem was found at, using
/// the same addressing as discrepancies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    /// Command name is empty or whitespace-only.
    #[error("{0}: command name cannot be empty")]
    EmptyCommandName(String),
    /// Flag name is empty or whitespace-only.
    #[error("{0}: flag name cannot be empty")]
    EmptyFlagName(String),
    /// Flag name starts with a dash.
    #[error("{0}: flag names are written without leading dashes")]
    DashedFlagName(String),
    /// Two flags on the same command share a name.
    #[error("{0}: duplicate flag name")]
    DuplicateFlag(String),
    /// Shorthand is not exactly one character.
    #[error("{path}: shorthand '{shorthand}' must be exactly one character")]
    InvalidShorthand { path: String, shorthand: String },
    /// Two flags on the same command share a shorthand.
    #[error("{path}: duplicate shorthand '{shorthand}'")]
    DuplicateShorthand { path: String, shorthand: String },
    /// Flag type is outside the enumerated set.
    #[error("{path}: unknown flag type '{flag_type}'")]
    UnknownFlagType { path: String, flag_type: String },
    /// Two subcommands of the same command share a name.
    #[error("{0}: duplicate subcommand")]
    DuplicateCommand(String),
}

/// Checks a contract tree and returns every structural problem found.
///
/// An empty result means the tree is safe to hand to
/// [`validate`](crate::validate).
pub fn check_structure(root: &CommandNode) -> Vec<StructureError> {
    let mut errors = Vec::new();
    check_node(root, "", &mut errors);
    errors
}

fn check_node(node: &CommandNode, path: &str, errors: &mut Vec<StructureError>) {
    if node.name.trim().is_empty() {
        let at = if path.is_empty() { ROOT_PATH } else { path };
        errors.push(StructureError::EmptyCommandName(at.to_string()));
    }

    check_flags(&node.flags, path, errors);

    let mut seen: HashSet<&str> = HashSet::new();
    for child in &node.children {
        let child_at = child_path(path, &child.name);
        if !child.name.trim().is_empty() && !seen.insert(child.name.as_str()) {
            errors.push(StructureError::DuplicateCommand(child_at.clone()));
            continue;
        }
        check_node(child, &child_at, errors);
    }
}

fn check_flags(flags: &[FlagDescriptor], path: &str, errors: &mut Vec<StructureError>) {
    let mut names: HashSet<&str> = HashSet::new();
    let mut shorthands: HashSet<&str> = HashSet::new();

    for flag in flags {
        let at = flag_path(path, &flag.name);

        if flag.name.trim().is_empty() {
            errors.push(StructureError::EmptyFlagName(at));
            continue;
        }
        if flag.name.starts_with('-') {
            errors.push(StructureError::DashedFlagName(at.clone()));
        }
        if !names.insert(flag.name.as_str()) {
            errors.push(StructureError::DuplicateFlag(at));
            continue;
        }

        if let Some(shorthand) = flag.shorthand.as_deref().filter(|s| !s.is_empty()) {
            if shorthand.chars().count() != 1 {
                errors.push(StructureError::InvalidShorthand {
                    path: at.clone(),
                    shorthand: shorthand.to_string(),
                });
            } else if !shorthands.insert(shorthand) {
                errors.push(StructureError::DuplicateShorthand {
                    path: at.clone(),
                    shorthand: shorthand.to_string(),
                });
            }
        }

        if !flag.flag_type.is_recognized() {
            errors.push(StructureError::UnknownFlagType {
                path: at,
                flag_type: flag.flag_type.to_string(),
            });
        }
    }
}
