//! Structural diff between a contract tree and an observed tree.
//!
//! [`validate`] walks both trees in lockstep, matching flags and subcommands
//! by name, and reports every difference as a [`Discrepancy`] addressed by
//! command path. Matching is purely name-keyed: a flag that exists on both
//! sides with different attributes is one entity with a mismatch, never a
//! missing flag plus an unexpected one.
//!
//! Description and usage fields follow an asymmetric policy: an empty field in
//! the contract leaves the observed value unconstrained.
//!
//! # Example
//!
//! ```
//! use cobra_contract_core::*;
//!
//! let contract = CommandNode::new("app")
//!     .with_flag(FlagDescriptor::new("verbose", FlagType::Bool));
//! let observed = CommandNode::new("app")
//!     .with_flag(FlagDescriptor::new("verbose", FlagType::String));
//!
//! let outcome = validate(&contract, &observed);
//! assert!(!outcome.valid);
//! assert_eq!(outcome.discrepancies.len(), 1);
//! assert_eq!(outcome.discrepancies[0].kind, DiscrepancyKind::InvalidType);
//! assert_eq!(outcome.discrepancies[0].path, "--verbose");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CommandNode, FlagDescriptor};

/// Path token used for node-level discrepancies on the root command.
pub const ROOT_PATH: &str = "root";

/// Placeholder rendered for an absent shorthand.
const NO_SHORTHAND: &str = "none";

/// Classification of a single difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiscrepancyKind {
    /// Declared in the contract, absent from the observed tree.
    Missing,
    /// Present in the observed tree, not declared in the contract.
    Unexpected,
    /// Same entity on both sides with a differing attribute.
    Mismatch,
    /// Same flag on both sides with a differing type.
    InvalidType,
}

impl DiscrepancyKind {
    /// Every kind, in display order.
    pub const ALL: [DiscrepancyKind; 4] = [
        DiscrepancyKind::Missing,
        DiscrepancyKind::Unexpected,
        DiscrepancyKind::Mismatch,
        DiscrepancyKind::InvalidType,
    ];
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "Missing"),
            Self::Unexpected => write!(f, "Unexpected"),
            Self::Mismatch => write!(f, "Mismatch"),
            Self::InvalidType => write!(f, "InvalidType"),
        }
    }
}

/// One structural difference between contract and observed trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    /// Space-joined command path; flags are addressed as `--name` after the
    /// owning command's path.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    pub message: String,
}

impl Discrepancy {
    fn missing(path: String, expected: &str, message: impl Into<String>) -> Self {
        Self {
            kind: DiscrepancyKind::Missing,
            path,
            expected: Some(expected.to_string()),
            actual: None,
            message: message.into(),
        }
    }

    fn unexpected(path: String, actual: &str, message: impl Into<String>) -> Self {
        Self {
            kind: DiscrepancyKind::Unexpected,
            path,
            expected: None,
            actual: Some(actual.to_string()),
            message: message.into(),
        }
    }

    fn differs(
        kind: DiscrepancyKind,
        path: String,
        expected: &str,
        actual: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path,
            expected: Some(expected.to_string()),
            actual: Some(actual.to_string()),
            message: message.into(),
        }
    }
}

/// Result of comparing two trees.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// `true` iff `discrepancies` is empty.
    pub valid: bool,
    pub discrepancies: Vec<Discrepancy>,
}

impl ValidationOutcome {
    /// Builds an outcome, deriving `valid` from the list.
    pub fn from_discrepancies(discrepancies: Vec<Discrepancy>) -> Self {
        Self {
            valid: discrepancies.is_empty(),
            discrepancies,
        }
    }

    /// Counts discrepancies of one kind.
    pub fn count(&self, kind: DiscrepancyKind) -> usize {
        self.discrepancies.iter().filter(|d| d.kind == kind).count()
    }

    /// Groups discrepancies by kind, in [`DiscrepancyKind::ALL`] order.
    /// Kinds with no entries are skipped.
    pub fn grouped(&self) -> Vec<(DiscrepancyKind, Vec<&Discrepancy>)> {
        DiscrepancyKind::ALL
            .iter()
            .filter_map(|kind| {
                let items: Vec<&Discrepancy> = self
                    .discrepancies
                    .iter()
                    .filter(|d| d.kind == *kind)
                    .collect();
                (!items.is_empty()).then_some((*kind, items))
            })
            .collect()
    }
}

/// Returns the path of `name` beneath `parent`. The root's own path is empty.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent} {name}")
    }
}

/// Returns the path addressing flag `name` on the command at `command_path`.
pub fn flag_path(command_path: &str, name: &str) -> String {
    child_path(command_path, &format!("--{name}"))
}

fn node_path(path: &str) -> String {
    if path.is_empty() {
        ROOT_PATH.to_string()
    } else {
        path.to_string()
    }
}

/// Compares `contract` against `observed`.
///
/// Pure and deterministic: flags and subcommands are visited in name order,
/// so the discrepancy list is identical across runs for the same inputs.
pub fn validate(contract: &CommandNode, observed: &CommandNode) -> ValidationOutcome {
    let mut discrepancies = Vec::new();

    if contract.name != observed.name {
        discrepancies.push(Discrepancy::differs(
            DiscrepancyKind::Mismatch,
            ROOT_PATH.to_string(),
            &contract.name,
            &observed.name,
            "root command name differs",
        ));
    }
    compare_node(contract, observed, "", &mut discrepancies);

    ValidationOutcome::from_discrepancies(discrepancies)
}

fn compare_node(
    contract: &CommandNode,
    observed: &CommandNode,
    path: &str,
    out: &mut Vec<Discrepancy>,
) {
    if !contract.short_description.is_empty()
        && contract.short_description != observed.short_description
    {
        out.push(Discrepancy::differs(
            DiscrepancyKind::Mismatch,
            node_path(path),
            &contract.short_description,
            &observed.short_description,
            "short description differs",
        ));
    }
    if !contract.long_text().is_empty() && contract.long_text() != observed.long_text() {
        out.push(Discrepancy::differs(
            DiscrepancyKind::Mismatch,
            node_path(path),
            contract.long_text(),
            observed.long_text(),
            "long description differs",
        ));
    }

    compare_flags(&contract.flags, &observed.flags, path, out);
    compare_children(&contract.children, &observed.children, path, out);
}

fn index_by_name<'a, T>(
    items: &'a [T],
    name: impl Fn(&T) -> &str,
) -> BTreeMap<&'a str, &'a T> {
    let mut map = BTreeMap::new();
    for item in items {
        map.entry(name(item)).or_insert(item);
    }
    map
}

fn compare_flags(
    contract: &[FlagDescriptor],
    observed: &[FlagDescriptor],
    path: &str,
    out: &mut Vec<Discrepancy>,
) {
    let expected = index_by_name(contract, |f| f.name.as_str());
    let actual = index_by_name(observed, |f| f.name.as_str());

    for (name, want) in &expected {
        let at = flag_path(path, name);
        match actual.get(name) {
            None => out.push(Discrepancy::missing(
                at,
                &want.display_name(),
                "flag declared in contract but not found on command",
            )),
            Some(got) => compare_flag(want, got, at, out),
        }
    }

    for (name, got) in &actual {
        if !expected.contains_key(name) {
            out.push(Discrepancy::unexpected(
                flag_path(path, name),
                &got.display_name(),
                "flag found on command but not declared in contract",
            ));
        }
    }
}

fn compare_flag(want: &FlagDescriptor, got: &FlagDescriptor, at: String, out: &mut Vec<Discrepancy>) {
    let want_short = shorthand_label(want);
    let got_short = shorthand_label(got);
    if want_short != got_short {
        out.push(Discrepancy::differs(
            DiscrepancyKind::Mismatch,
            at.clone(),
            want_short,
            got_short,
            "flag shorthand differs",
        ));
    }

    if !want.usage.is_empty() && want.usage != got.usage {
        out.push(Discrepancy::differs(
            DiscrepancyKind::Mismatch,
            at.clone(),
            &want.usage,
            &got.usage,
            "flag usage text differs",
        ));
    }

    if want.flag_type != got.flag_type {
        out.push(Discrepancy::differs(
            DiscrepancyKind::InvalidType,
            at.clone(),
            want.flag_type.as_str(),
            got.flag_type.as_str(),
            "flag type differs",
        ));
    }

    if want.persistent != got.persistent {
        out.push(Discrepancy::differs(
            DiscrepancyKind::Mismatch,
            at,
            want.scope_label(),
            got.scope_label(),
            "flag persistence differs",
        ));
    }
}

fn shorthand_label(flag: &FlagDescriptor) -> &str {
    flag.shorthand
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SHORTHAND)
}

fn compare_children(
    contract: &[CommandNode],
    observed: &[CommandNode],
    path: &str,
    out: &mut Vec<Discrepancy>,
) {
    let expected = index_by_name(contract, |c| c.name.as_str());
    let actual = index_by_name(observed, |c| c.name.as_str());

    for (name, want) in &expected {
        let at = child_path(path, name);
        match actual.get(name) {
            None => out.push(Discrepancy::missing(
                at,
                name,
                "command declared in contract but not found",
            )),
            Some(got) => compare_node(want, got, &at, out),
        }
    }

    for name in actual.keys() {
        if !expected.contains_key(name) {
            out.push(Discrepancy::unexpected(
                child_path(path, name),
                name,
                "command found but not declared in contract",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::FlagType;

    use super::*;

    fn sample_tree() -> CommandNode {
        CommandNode::new("app")
            .with_short("Example app")
            .with_long("An example application.")
            .with_flag(
                FlagDescriptor::new("config", FlagType::String)
                    .with_shorthand("c")
                    .with_usage("config file")
                    .persistent(),
            )
            .with_flag(FlagDescriptor::new("verbose", FlagType::Count).with_shorthand("v"))
            .with_child(
                CommandNode::new("serve")
                    .with_short("Run the server")
                    .with_flag(FlagDescriptor::new("port", FlagType::Int).with_shorthand("p"))
                    .with_child(
                        CommandNode::new("tls")
                            .with_flag(FlagDescriptor::new("cert", FlagType::String)),
                    ),
            )
            .with_child(CommandNode::new("version"))
    }

    #[test]
    fn test_validate_is_reflexive() {
        let tree = sample_tree();
        let outcome = validate(&tree, &tree);
        assert!(outcome.valid);
        assert!(outcome.discrepancies.is_empty());
    }

    #[test]
    fn test_disjoint_flag_sets_report_each_side() {
        let contract = CommandNode::new("app")
            .with_flag(FlagDescriptor::new("alpha", FlagType::Bool))
            .with_flag(FlagDescriptor::new("beta", FlagType::Bool));
        let observed = CommandNode::new("app")
            .with_flag(FlagDescriptor::new("gamma", FlagType::Bool))
            .with_flag(FlagDescriptor::new("delta", FlagType::Bool))
            .with_flag(FlagDescriptor::new("epsilon", FlagType::Bool));

        let outcome = validate(&contract, &observed);
        assert_eq!(outcome.discrepancies.len(), 5);
        assert_eq!(outcome.count(DiscrepancyKind::Missing), 2);
        assert_eq!(outcome.count(DiscrepancyKind::Unexpected), 3);

        let missing: Vec<&str> = outcome
            .discrepancies
            .iter()
            .filter(|d| d.kind == DiscrepancyKind::Missing)
            .map(|d| d.path.as_str())
            .collect();
        assert_eq!(missing, vec!["--alpha", "--beta"]);
    }

    #[test]
    fn test_type_change_yields_single_invalid_type() {
        let contract = sample_tree();
        let mut observed = sample_tree();
        observed.children[0].flags[0].flag_type = FlagType::String;

        let outcome = validate(&contract, &observed);
        assert_eq!(
            outcome.discrepancies,
            vec![Discrepancy {
                kind: DiscrepancyKind::InvalidType,
                path: "serve --port".to_string(),
                expected: Some("int".to_string()),
                actual: Some("string".to_string()),
                message: "flag type differs".to_string(),
            }]
        );
    }

    #[test]
    fn test_persistence_mismatch_renders_scope_labels() {
        let contract = CommandNode::new("app")
            .with_flag(FlagDescriptor::new("config", FlagType::String).persistent());
        let observed =
            CommandNode::new("app").with_flag(FlagDescriptor::new("config", FlagType::String));

        let forward = validate(&contract, &observed);
        assert_eq!(forward.discrepancies.len(), 1);
        assert_eq!(forward.discrepancies[0].kind, DiscrepancyKind::Mismatch);
        assert_eq!(forward.discrepancies[0].expected.as_deref(), Some("persistent"));
        assert_eq!(forward.discrepancies[0].actual.as_deref(), Some("local"));

        let reverse = validate(&observed, &contract);
        assert_eq!(reverse.discrepancies[0].expected.as_deref(), Some("local"));
        assert_eq!(reverse.discrepancies[0].actual.as_deref(), Some("persistent"));
    }

    #[test]
    fn test_end_to_end_bool_flag_observed_as_string() {
        let contract =
            CommandNode::new("app").with_flag(FlagDescriptor::new("verbose", FlagType::Bool));
        let observed =
            CommandNode::new("app").with_flag(FlagDescriptor::new("verbose", FlagType::String));

        let outcome = validate(&contract, &observed);
        assert!(!outcome.valid);
        assert_eq!(outcome.discrepancies.len(), 1);
        assert_eq!(outcome.discrepancies[0].kind, DiscrepancyKind::InvalidType);
        assert_eq!(outcome.discrepancies[0].path, "--verbose");
    }

    #[test]
    fn test_unrecognized_observed_type_reports_raw_identifier() {
        let contract =
            CommandNode::new("app").with_flag(FlagDescriptor::new("color", FlagType::String));
        let observed = CommandNode::new("app").with_flag(FlagDescriptor::new(
            "color",
            FlagType::Unrecognized("*main.colorValue".to_string()),
        ));

        let outcome = validate(&contract, &observed);
        assert_eq!(outcome.discrepancies.len(), 1);
        assert_eq!(
            outcome.discrepancies[0].actual.as_deref(),
            Some("*main.colorValue")
        );
    }

    #[test]
    fn test_empty_contract_descriptions_are_unconstrained() {
        let contract = CommandNode::new("app")
            .with_flag(FlagDescriptor::new("port", FlagType::Int));
        let observed = CommandNode::new("app")
            .with_short("Anything goes")
            .with_long("Long text the contract does not pin")
            .with_flag(FlagDescriptor::new("port", FlagType::Int).with_usage("listen port"));

        assert!(validate(&contract, &observed).valid);
    }

    #[test]
    fn test_declared_descriptions_must_match() {
        let contract = CommandNode::new("app").with_short("Old").with_long("Old long");
        let observed = CommandNode::new("app").with_short("New");

        let outcome = validate(&contract, &observed);
        let messages: Vec<&str> = outcome
            .discrepancies
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec!["short description differs", "long description differs"]
        );
        assert!(outcome.discrepancies.iter().all(|d| d.path == "root"));
    }

    #[test]
    fn test_root_name_mismatch_uses_root_path() {
        let outcome = validate(&CommandNode::new("app"), &CommandNode::new("other"));
        assert_eq!(outcome.discrepancies.len(), 1);
        assert_eq!(outcome.discrepancies[0].path, "root");
        assert_eq!(outcome.discrepancies[0].expected.as_deref(), Some("app"));
    }

    #[test]
    fn test_nested_missing_and_unexpected_commands() {
        let contract = sample_tree();
        let mut observed = sample_tree();
        observed.children[0].children.clear();
        observed.children[0]
            .children
            .push(CommandNode::new("grpc"));

        let outcome = validate(&contract, &observed);
        let summary: Vec<(DiscrepancyKind, &str)> = outcome
            .discrepancies
            .iter()
            .map(|d| (d.kind, d.path.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (DiscrepancyKind::Missing, "serve tls"),
                (DiscrepancyKind::Unexpected, "serve grpc"),
            ]
        );
    }

    #[test]
    fn test_shorthand_and_usage_mismatch_on_same_flag() {
        let contract = CommandNode::new("app").with_flag(
            FlagDescriptor::new("output", FlagType::String)
                .with_shorthand("o")
                .with_usage("output file"),
        );
        let observed = CommandNode::new("app")
            .with_flag(FlagDescriptor::new("output", FlagType::String).with_usage("where to write"));

        let outcome = validate(&contract, &observed);
        assert_eq!(outcome.count(DiscrepancyKind::Mismatch), 2);
        assert_eq!(outcome.discrepancies[0].expected.as_deref(), Some("o"));
        assert_eq!(outcome.discrepancies[0].actual.as_deref(), Some("none"));
        assert_eq!(outcome.count(DiscrepancyKind::Missing), 0);
        assert_eq!(outcome.count(DiscrepancyKind::Unexpected), 0);
    }

    #[test]
    fn test_output_order_is_independent_of_input_order() {
        let contract = sample_tree();
        let mut observed = sample_tree();
        observed.flags.reverse();
        observed.children.reverse();
        observed.flags.push(FlagDescriptor::new("zeta", FlagType::Bool));
        observed.flags.push(FlagDescriptor::new("alpha", FlagType::Bool));

        let first = validate(&contract, &observed);
        observed.flags.reverse();
        let second = validate(&contract, &observed);
        assert_eq!(first, second);
        assert_eq!(first.discrepancies[0].path, "--alpha");
    }

    #[test]
    fn test_grouped_follows_kind_order() {
        let contract = CommandNode::new("app")
            .with_flag(FlagDescriptor::new("gone", FlagType::Bool))
            .with_flag(FlagDescriptor::new("typed", FlagType::Int));
        let observed = CommandNode::new("app")
            .with_flag(FlagDescriptor::new("typed", FlagType::Uint))
            .with_flag(FlagDescriptor::new("extra", FlagType::Bool));

        let outcome = validate(&contract, &observed);
        let kinds: Vec<DiscrepancyKind> = outcome.grouped().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                DiscrepancyKind::Missing,
                DiscrepancyKind::Unexpected,
                DiscrepancyKind::InvalidType,
            ]
        );
    }
}
