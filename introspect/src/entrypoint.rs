//! Entrypoint reference parsing.
//!
//! An entrypoint names the Go function that returns the project's root
//! `*cobra.Command`:
//!
//! | Input | Meaning |
//! |---|---|
//! | `""` | no entrypoint; discover a conventional root in package `main` |
//! | `main.NewRootCmd` | function in the project's own `main` package |
//! | `example.com/app/cmd.NewRootCmd` | function in an importable package |
//!
//! Import paths are split from the function name at the last dot, so paths
//! with dotted host names parse as expected.

use cobra_contract_core::EntrypointReference;

use crate::error::{IntrospectError, Result};

/// Alias the target package is imported under in the synthesized program.
pub const TARGET_IMPORT_ALIAS: &str = "contracttarget";

/// Parses an entrypoint string.
///
/// # Errors
///
/// Returns [`IntrospectError::MalformedEntrypoint`] for non-empty input with
/// no dot, or with an empty import path or function name.
///
/// # Examples
///
/// ```
/// use cobra_contract_introspect::resolve_entrypoint;
///
/// let root = resolve_entrypoint("main.NewRootCmd").unwrap();
/// assert!(root.is_root_program_reference);
/// assert!(root.import_path.is_empty());
///
/// let pkg = resolve_entrypoint("github.com/acme/tool/cmd.Execute").unwrap();
/// assert_eq!(pkg.import_path, "github.com/acme/tool/cmd");
/// assert_eq!(pkg.function_name, "Execute");
///
/// assert!(resolve_entrypoint("NewRootCmd").is_err());
/// ```
pub fn resolve_entrypoint(input: &str) -> Result<EntrypointReference> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(EntrypointReference {
            is_root_program_reference: true,
            ..EntrypointReference::default()
        });
    }

    let Some((import_path, function_name)) = trimmed.rsplit_once('.') else {
        return Err(IntrospectError::malformed_entrypoint(
            input,
            "expected <import path>.<function> or main.<function>",
        ));
    };

    if function_name.is_empty() {
        return Err(IntrospectError::malformed_entrypoint(
            input,
            "function name is empty",
        ));
    }

    if import_path == "main" {
        return Ok(EntrypointReference {
            import_path: String::new(),
            import_alias: String::new(),
            function_name: function_name.to_string(),
            is_root_program_reference: true,
        });
    }

    if import_path.is_empty() {
        return Err(IntrospectError::malformed_entrypoint(
            input,
            "import path is empty",
        ));
    }

    Ok(EntrypointReference {
        import_path: import_path.to_string(),
        import_alias: TARGET_IMPORT_ALIAS.to_string(),
        function_name: function_name.to_string(),
        is_root_program_reference: false,
    })
}
