//! Go introspection program synthesis.
//!
//! Renders a throwaway `package main` that obtains the target's root
//! `*cobra.Command`, walks it, and prints the tree as one JSON document on
//! stdout. The JSON field names match [`CommandNode`]'s serde encoding, so
//! the output decodes without a translation layer.
//!
//! Flag types are recovered from the concrete pflag value type (`%T` of
//! `flag.Value`, e.g. `*pflag.stringSliceValue`). Types outside the known
//! table are emitted verbatim and surface as
//! [`FlagType::Unrecognized`](cobra_contract_core::FlagType::Unrecognized).
//!
//! Rendering is pure: nothing here touches the filesystem.
//!
//! [`CommandNode`]: cobra_contract_core::CommandNode

use std::fmt::{self, Write};
use std::sync::LazyLock;

use cobra_contract_core::{EntrypointReference, FlagType};
use regex::Regex;
use thiserror::Error;

/// File name of the synthesized program inside the workspace.
pub const PROGRAM_FILE: &str = "main.go";

/// File name of the fallback root shim inside the workspace.
pub const FALLBACK_FILE: &str = "introspect_fallback.go";

/// Exit code of the program when no root command could be obtained.
pub const EXIT_NO_ROOT: i32 = 3;

/// Exit code of the program when the tree cannot be encoded.
pub const EXIT_ENCODE_FAILED: i32 = 4;

const COBRA_IMPORT: &str = "github.com/spf13/cobra";
const PFLAG_IMPORT: &str = "github.com/spf13/pflag";

static GO_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex must compile")
});

static GO_IMPORT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.~+-]+(?:/[A-Za-z0-9_.~+-]+)*$").expect("static regex must compile")
});

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("template rendering failed: {0}")]
    Render(#[from] fmt::Error),

    #[error("'{value}' is not a valid Go {kind}")]
    InvalidIdentifier { kind: &'static str, value: String },
}

/// A conventional root command found in the project's `main` package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSymbol {
    /// Constructor function, called with no arguments.
    Constructor(String),
    /// Package-level `*cobra.Command` variable.
    Variable(String),
}

impl RootSymbol {
    /// Go expression yielding the root command.
    pub fn expression(&self) -> String {
        match self {
            Self::Constructor(name) => format!("{name}()"),
            Self::Variable(name) => name.clone(),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Constructor(name) | Self::Variable(name) => name,
        }
    }
}

/// Rendered introspection program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedProgram {
    /// Contents of [`PROGRAM_FILE`].
    pub source: String,
    /// `true` when the program calls `introspectFallbackRoot()`, which must
    /// be supplied by [`render_fallback_shim`].
    pub needs_fallback: bool,
}

/// Maps a flag type to the pflag value type that implements it.
///
/// ```
/// use cobra_contract_core::FlagType;
/// use cobra_contract_introspect::synthesize::pflag_value_type;
///
/// assert_eq!(pflag_value_type(&FlagType::StringSlice).as_deref(), Some("*pflag.stringSliceValue"));
/// assert_eq!(pflag_value_type(&FlagType::Count).as_deref(), Some("*pflag.countValue"));
/// ```
pub fn pflag_value_type(flag_type: &FlagType) -> Option<String> {
    flag_type
        .is_recognized()
        .then(|| format!("*pflag.{}Value", flag_type.as_str()))
}

/// Renders the introspection program for `reference`.
///
/// # Errors
///
/// Returns [`SynthesisError::InvalidIdentifier`] if the function name or
/// import path could not appear in Go source as written.
pub fn synthesize_program(
    reference: &EntrypointReference,
) -> Result<SynthesizedProgram, SynthesisError> {
    check_reference(reference)?;

    let needs_fallback = reference.is_unspecified();
    let mut out = String::new();
    write_header(&mut out, reference)?;
    write_types(&mut out)?;
    write_flag_type_switch(&mut out)?;
    write_walker(&mut out)?;
    write_root(&mut out, reference)?;
    write_main(&mut out)?;

    Ok(SynthesizedProgram {
        source: out,
        needs_fallback,
    })
}

/// Renders the `introspectFallbackRoot()` helper.
///
/// With no symbol the helper returns `nil`, and the program reports that no
/// root command was found.
pub fn render_fallback_shim(symbol: Option<&RootSymbol>) -> Result<String, SynthesisError> {
    if let Some(symbol) = symbol {
        check_identifier("identifier", symbol.name())?;
    }
    let expression = symbol.map_or_else(|| "nil".to_string(), RootSymbol::expression);

    let mut out = String::new();
    writeln!(out, "// Code generated by cobra-contract. DO NOT EDIT.")?;
    writeln!(out)?;
    writeln!(out, "package main")?;
    writeln!(out)?;
    writeln!(out, "import \"{COBRA_IMPORT}\"")?;
    writeln!(out)?;
    writeln!(out, "func introspectFallbackRoot() *cobra.Command {{")?;
    writeln!(out, "\treturn {expression}")?;
    writeln!(out, "}}")?;
    Ok(out)
}

fn check_reference(reference: &EntrypointReference) -> Result<(), SynthesisError> {
    if !reference.is_unspecified() {
        check_identifier("function name", &reference.function_name)?;
    }
    if reference.needs_import() {
        check_identifier("package alias", &reference.import_alias)?;
        if !GO_IMPORT_PATH.is_match(&reference.import_path) {
            return Err(SynthesisError::InvalidIdentifier {
                kind: "import path",
                value: reference.import_path.clone(),
            });
        }
    }
    Ok(())
}

fn check_identifier(kind: &'static str, value: &str) -> Result<(), SynthesisError> {
    if GO_IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(SynthesisError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}

fn write_header(out: &mut String, reference: &EntrypointReference) -> fmt::Result {
    writeln!(out, "// Code generated by cobra-contract. DO NOT EDIT.")?;
    writeln!(out, "//")?;
    writeln!(out, "// Entrypoint: {reference}")?;
    writeln!(out)?;
    writeln!(out, "package main")?;
    writeln!(out)?;
    writeln!(out, "import (")?;
    writeln!(out, "\t\"encoding/json\"")?;
    writeln!(out, "\t\"fmt\"")?;
    writeln!(out, "\t\"os\"")?;
    writeln!(out)?;
    writeln!(out, "\t\"{COBRA_IMPORT}\"")?;
    writeln!(out, "\t\"{PFLAG_IMPORT}\"")?;
    if reference.needs_import() {
        writeln!(out)?;
        writeln!(
            out,
            "\t{} \"{}\"",
            reference.import_alias, reference.import_path
        )?;
    }
    writeln!(out, ")")?;
    writeln!(out)
}

fn write_types(out: &mut String) -> fmt::Result {
    writeln!(out, "type introspectFlag struct {{")?;
    writeln!(out, "\tName       string `json:\"name\"`")?;
    writeln!(out, "\tShorthand  string `json:\"shorthand,omitempty\"`")?;
    writeln!(out, "\tUsage      string `json:\"usage\"`")?;
    writeln!(out, "\tType       string `json:\"type\"`")?;
    writeln!(out, "\tPersistent bool   `json:\"persistent\"`")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "type introspectNode struct {{")?;
    writeln!(out, "\tName             string           `json:\"name\"`")?;
    writeln!(out, "\tShortDescription string           `json:\"shortDescription\"`")?;
    writeln!(
        out,
        "\tLongDescription  string           `json:\"longDescription,omitempty\"`"
    )?;
    writeln!(out, "\tFlags            []introspectFlag `json:\"flags\"`")?;
    writeln!(
        out,
        "\tChildren         []introspectNode `json:\"children,omitempty\"`"
    )?;
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_flag_type_switch(out: &mut String) -> fmt::Result {
    writeln!(out, "func introspectFlagType(f *pflag.Flag) string {{")?;
    writeln!(out, "\tconcrete := fmt.Sprintf(\"%T\", f.Value)")?;
    writeln!(out, "\tswitch concrete {{")?;
    for flag_type in FlagType::ALL {
        if let Some(value_type) = pflag_value_type(flag_type) {
            writeln!(out, "\tcase \"{value_type}\":")?;
            writeln!(out, "\t\treturn \"{}\"", flag_type.as_str())?;
        }
    }
    writeln!(out, "\t}}")?;
    writeln!(out, "\treturn concrete")?;
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_walker(out: &mut String) -> fmt::Result {
    writeln!(out, "func introspectFlags(cmd *cobra.Command) []introspectFlag {{")?;
    writeln!(out, "\tflags := []introspectFlag{{}}")?;
    writeln!(out, "\tseen := map[string]bool{{}}")?;
    writeln!(out, "\tcollect := func(set *pflag.FlagSet, persistent bool) {{")?;
    writeln!(out, "\t\tset.VisitAll(func(f *pflag.Flag) {{")?;
    writeln!(out, "\t\t\tif seen[f.Name] {{")?;
    writeln!(out, "\t\t\t\treturn")?;
    writeln!(out, "\t\t\t}}")?;
    writeln!(out, "\t\t\tseen[f.Name] = true")?;
    writeln!(out, "\t\t\tflags = append(flags, introspectFlag{{")?;
    writeln!(out, "\t\t\t\tName:       f.Name,")?;
    writeln!(out, "\t\t\t\tShorthand:  f.Shorthand,")?;
    writeln!(out, "\t\t\t\tUsage:      f.Usage,")?;
    writeln!(out, "\t\t\t\tType:       introspectFlagType(f),")?;
    writeln!(out, "\t\t\t\tPersistent: persistent,")?;
    writeln!(out, "\t\t\t}})")?;
    writeln!(out, "\t\t}})")?;
    writeln!(out, "\t}}")?;
    // Local flags first: a name on both sets is reported as local.
    writeln!(out, "\tcollect(cmd.LocalNonPersistentFlags(), false)")?;
    writeln!(out, "\tcollect(cmd.PersistentFlags(), true)")?;
    writeln!(out, "\treturn flags")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "func introspectWalk(cmd *cobra.Command) introspectNode {{")?;
    writeln!(out, "\tnode := introspectNode{{")?;
    writeln!(out, "\t\tName:             cmd.Name(),")?;
    writeln!(out, "\t\tShortDescription: cmd.Short,")?;
    writeln!(out, "\t\tLongDescription:  cmd.Long,")?;
    writeln!(out, "\t\tFlags:            introspectFlags(cmd),")?;
    writeln!(out, "\t}}")?;
    writeln!(out, "\tfor _, child := range cmd.Commands() {{")?;
    writeln!(out, "\t\tnode.Children = append(node.Children, introspectWalk(child))")?;
    writeln!(out, "\t}}")?;
    writeln!(out, "\treturn node")?;
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_root(out: &mut String, reference: &EntrypointReference) -> fmt::Result {
    let expression = if reference.is_unspecified() {
        "introspectFallbackRoot()".to_string()
    } else if reference.needs_import() {
        format!("{}.{}()", reference.import_alias, reference.function_name)
    } else {
        format!("{}()", reference.function_name)
    };
    writeln!(out, "func introspectRoot() *cobra.Command {{")?;
    writeln!(out, "\treturn {expression}")?;
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_main(out: &mut String) -> fmt::Result {
    writeln!(out, "func main() {{")?;
    writeln!(out, "\troot := introspectRoot()")?;
    writeln!(out, "\tif root == nil {{")?;
    writeln!(
        out,
        "\t\tfmt.Fprintln(os.Stderr, \"cobra-contract: no root command found\")"
    )?;
    writeln!(out, "\t\tos.Exit({EXIT_NO_ROOT})")?;
    writeln!(out, "\t}}")?;
    writeln!(out, "\tencoder := json.NewEncoder(os.Stdout)")?;
    writeln!(out, "\tif err := encoder.Encode(introspectWalk(root)); err != nil {{")?;
    writeln!(
        out,
        "\t\tfmt.Fprintf(os.Stderr, \"cobra-contract: encode command tree: %v\\n\", err)"
    )?;
    writeln!(out, "\t\tos.Exit({EXIT_ENCODE_FAILED})")?;
    writeln!(out, "\t}}")?;
    writeln!(out, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entrypoint::resolve_entrypoint;

    #[test]
    fn test_package_entrypoint_imports_target_under_alias() {
        let reference = resolve_entrypoint("example.com/app/cmd.NewRootCmd").unwrap();
        let program = synthesize_program(&reference).unwrap();

        assert!(!program.needs_fallback);
        assert!(program.source.contains("\tcontracttarget \"example.com/app/cmd\"\n"));
        assert!(program.source.contains("\treturn contracttarget.NewRootCmd()\n"));
        assert!(program.source.starts_with("// Code generated"));
        assert!(program.source.contains("\npackage main\n"));
    }

    #[test]
    fn test_root_program_entrypoint_calls_function_directly() {
        let reference = resolve_entrypoint("main.newRootCommand").unwrap();
        let program = synthesize_program(&reference).unwrap();

        assert!(!program.source.contains("contracttarget"));
        assert!(program.source.contains("\treturn newRootCommand()\n"));
    }

    #[test]
    fn test_unspecified_entrypoint_uses_fallback() {
        let program = synthesize_program(&resolve_entrypoint("").unwrap()).unwrap();
        assert!(program.needs_fallback);
        assert!(program.source.contains("\treturn introspectFallbackRoot()\n"));
    }

    #[test]
    fn test_flag_type_switch_covers_every_known_type() {
        let program = synthesize_program(&resolve_entrypoint("main.Root").unwrap()).unwrap();
        for flag_type in FlagType::ALL {
            let case = format!(
                "case \"*pflag.{}Value\":\n\t\treturn \"{}\"",
                flag_type.as_str(),
                flag_type.as_str()
            );
            assert!(program.source.contains(&case), "missing {case}");
        }
        assert!(program.source.contains("\treturn concrete\n"));
    }

    #[test]
    fn test_local_flags_are_collected_before_persistent() {
        let program = synthesize_program(&resolve_entrypoint("main.Root").unwrap()).unwrap();
        let local = program.source.find("LocalNonPersistentFlags(), false").unwrap();
        let persistent = program.source.find("PersistentFlags(), true").unwrap();
        assert!(local < persistent);
    }

    #[test]
    fn test_program_json_tags_match_tree_encoding() {
        let program = synthesize_program(&resolve_entrypoint("main.Root").unwrap()).unwrap();
        for tag in [
            "json:\"shortDescription\"",
            "json:\"longDescription,omitempty\"",
            "json:\"children,omitempty\"",
            "json:\"shorthand,omitempty\"",
            "json:\"persistent\"",
        ] {
            assert!(program.source.contains(tag), "missing {tag}");
        }
    }

    #[test]
    fn test_rejects_identifiers_that_are_not_go() {
        let reference = EntrypointReference {
            import_path: "example.com/app\"; os.Exit(1)".to_string(),
            import_alias: "contracttarget".to_string(),
            function_name: "Root".to_string(),
            is_root_program_reference: false,
        };
        assert!(matches!(
            synthesize_program(&reference),
            Err(SynthesisError::InvalidIdentifier { kind: "import path", .. })
        ));

        let reference = EntrypointReference {
            function_name: "New-Root".to_string(),
            is_root_program_reference: true,
            ..EntrypointReference::default()
        };
        assert!(matches!(
            synthesize_program(&reference),
            Err(SynthesisError::InvalidIdentifier { kind: "function name", .. })
        ));
    }

    #[test]
    fn test_fallback_shim_variants() {
        let constructor =
            render_fallback_shim(Some(&RootSymbol::Constructor("NewRootCmd".to_string()))).unwrap();
        assert!(constructor.contains("\treturn NewRootCmd()\n"));

        let variable = render_fallback_shim(Some(&RootSymbol::Variable("rootCmd".to_string()))).unwrap();
        assert!(variable.contains("\treturn rootCmd\n"));

        let none = render_fallback_shim(None).unwrap();
        assert!(none.contains("\treturn nil\n"));
        assert!(none.contains("func introspectFallbackRoot() *cobra.Command"));
    }
}
