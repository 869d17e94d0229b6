//! Introspection output decoding.

use cobra_contract_core::CommandNode;

use crate::error::{IntrospectError, Result};

/// Decodes the program's stdout into a command tree.
///
/// Leading and trailing whitespace is ignored. Flag types outside the known
/// set decode as `FlagType::Unrecognized` rather than failing.
///
/// # Errors
///
/// Returns [`IntrospectError::MalformedOutput`] carrying the raw bytes when
/// the output is not a single JSON command tree.
///
/// # Examples
///
/// ```
/// use cobra_contract_introspect::decode_tree;
///
/// let tree = decode_tree(br#"{"name":"app","shortDescription":"","flags":[]}"#).unwrap();
/// assert_eq!(tree.name, "app");
/// ```
pub fn decode_tree(raw: &[u8]) -> Result<CommandNode> {
    serde_json::from_slice(raw).map_err(|source| IntrospectError::MalformedOutput {
        raw: raw.to_vec(),
        source,
    })
}
