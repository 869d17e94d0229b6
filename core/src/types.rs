//! Command-tree type definitions.
//!
//! The same [`CommandNode`] shape describes both sides of a comparison: the
//! contract loaded from disk and the tree observed from a running program.
//! Field names serialize in camelCase so the types double as the wire format
//! emitted by the introspection program.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Flag value type.
///
/// The named variants form the fixed set a contract may declare. Observed
/// trees may additionally carry [`FlagType::Unrecognized`], holding whatever
/// type identifier the framework reported when it is not in the set.
///
/// # Examples
///
/// ```
/// use cobra_contract_core::FlagType;
///
/// assert_eq!(FlagType::parse("stringSlice"), FlagType::StringSlice);
/// assert_eq!(FlagType::StringSlice.as_str(), "stringSlice");
///
/// let custom = FlagType::parse("*main.enumValue");
/// assert!(!custom.is_recognized());
/// assert_eq!(custom.as_str(), "*main.enumValue");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FlagType {
    #[default]
    Bool,
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Duration,
    StringSlice,
    StringArray,
    IntSlice,
    Int32Slice,
    Int64Slice,
    UintSlice,
    Float32Slice,
    Float64Slice,
    BoolSlice,
    DurationSlice,
    StringToString,
    StringToInt,
    StringToInt64,
    Ip,
    IpSlice,
    IpMask,
    IpNet,
    BytesHex,
    BytesBase64,
    /// Repeat counter (`-vvv`).
    Count,
    /// Type identifier outside the enumerated set, kept verbatim.
    Unrecognized(String),
}

impl FlagType {
    /// Every recognized type, in declaration order.
    pub const ALL: &'static [FlagType] = &[
        FlagType::Bool,
        FlagType::String,
        FlagType::Int,
        FlagType::Int8,
        FlagType::Int16,
        FlagType::Int32,
        FlagType::Int64,
        FlagType::Uint,
        FlagType::Uint8,
        FlagType::Uint16,
        FlagType::Uint32,
        FlagType::Uint64,
        FlagType::Float32,
        FlagType::Float64,
        FlagType::Duration,
        FlagType::StringSlice,
        FlagType::StringArray,
        FlagType::IntSlice,
        FlagType::Int32Slice,
        FlagType::Int64Slice,
        FlagType::UintSlice,
        FlagType::Float32Slice,
        FlagType::Float64Slice,
        FlagType::BoolSlice,
        FlagType::DurationSlice,
        FlagType::StringToString,
        FlagType::StringToInt,
        FlagType::StringToInt64,
        FlagType::Ip,
        FlagType::IpSlice,
        FlagType::IpMask,
        FlagType::IpNet,
        FlagType::BytesHex,
        FlagType::BytesBase64,
        FlagType::Count,
    ];

    /// Parses a type name. Never fails: unknown names become
    /// [`FlagType::Unrecognized`].
    pub fn parse(raw: &str) -> Self {
        Self::ALL
            .iter()
            .find(|known| known.as_str() == raw)
            .cloned()
            .unwrap_or_else(|| FlagType::Unrecognized(raw.to_string()))
    }

    /// Returns the canonical type name.
    pub fn as_str(&self) -> &str {
        match self {
            FlagType::Bool => "bool",
            FlagType::String => "string",
            FlagType::Int => "int",
            FlagType::Int8 => "int8",
            FlagType::Int16 => "int16",
            FlagType::Int32 => "int32",
            FlagType::Int64 => "int64",
            FlagType::Uint => "uint",
            FlagType::Uint8 => "uint8",
            FlagType::Uint16 => "uint16",
            FlagType::Uint32 => "uint32",
            FlagType::Uint64 => "uint64",
            FlagType::Float32 => "float32",
            FlagType::Float64 => "float64",
            FlagType::Duration => "duration",
            FlagType::StringSlice => "stringSlice",
            FlagType::StringArray => "stringArray",
            FlagType::IntSlice => "intSlice",
            FlagType::Int32Slice => "int32Slice",
            FlagType::Int64Slice => "int64Slice",
            FlagType::UintSlice => "uintSlice",
            FlagType::Float32Slice => "float32Slice",
            FlagType::Float64Slice => "float64Slice",
            FlagType::BoolSlice => "boolSlice",
            FlagType::DurationSlice => "durationSlice",
            FlagType::StringToString => "stringToString",
            FlagType::StringToInt => "stringToInt",
            FlagType::StringToInt64 => "stringToInt64",
            FlagType::Ip => "ip",
            FlagType::IpSlice => "ipSlice",
            FlagType::IpMask => "ipMask",
            FlagType::IpNet => "ipNet",
            FlagType::BytesHex => "bytesHex",
            FlagType::BytesBase64 => "bytesBase64",
            FlagType::Count => "count",
            FlagType::Unrecognized(raw) => raw,
        }
    }

    /// Returns `false` only for [`FlagType::Unrecognized`].
    pub fn is_recognized(&self) -> bool {
        !matches!(self, FlagType::Unrecognized(_))
    }
}

impl From<String> for FlagType {
    fn from(raw: String) -> Self {
        FlagType::parse(&raw)
    }
}

impl From<FlagType> for String {
    fn from(flag_type: FlagType) -> Self {
        flag_type.as_str().to_string()
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single flag declared on a command.
///
/// # Examples
///
/// ```
/// use cobra_contract_core::{FlagDescriptor, FlagType};
///
/// let verbose = FlagDescriptor::new("verbose", FlagType::Bool)
///     .with_shorthand("v")
///     .with_usage("Enable verbose output")
///     .persistent();
/// assert_eq!(verbose.display_name(), "--verbose");
/// assert!(verbose.persistent);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagDescriptor {
    /// Long name, without leading dashes.
    pub name: String,
    /// Single-character abbreviation, without the leading dash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shorthand: Option<String>,
    /// Help text.
    #[serde(default)]
    pub usage: String,
    /// Value type.
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    /// Inherited by descendant commands when `true`.
    #[serde(default)]
    pub persistent: bool,
}

impl FlagDescriptor {
    /// Creates a local flag with no shorthand or usage text.
    pub fn new(name: &str, flag_type: FlagType) -> Self {
        Self {
            name: name.to_string(),
            flag_type,
            ..Default::default()
        }
    }

    /// Sets the shorthand.
    pub fn with_shorthand(mut self, shorthand: &str) -> Self {
        self.shorthand = Some(shorthand.to_string());
        self
    }

    /// Sets the usage text.
    pub fn with_usage(mut self, usage: &str) -> Self {
        self.usage = usage.to_string();
        self
    }

    /// Marks the flag as persistent.
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    /// Returns the `--name` form used in discrepancy paths.
    pub fn display_name(&self) -> String {
        format!("--{}", self.name)
    }

    /// Returns `"persistent"` or `"local"`.
    pub fn scope_label(&self) -> &'static str {
        if self.persistent { "persistent" } else { "local" }
    }
}

/// A command in a command tree.
///
/// # Examples
///
/// ```
/// use cobra_contract_core::{CommandNode, FlagDescriptor, FlagType};
///
/// let root = CommandNode::new("app")
///     .with_short("Example application")
///     .with_flag(FlagDescriptor::new("config", FlagType::String).persistent())
///     .with_child(CommandNode::new("serve"));
///
/// assert_eq!(root.find_child("serve").unwrap().name, "serve");
/// assert!(root.find_flag("config").is_some());
/// assert_eq!(root.node_count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandNode {
    /// Invocation token.
    pub name: String,
    /// One-line help text.
    #[serde(default)]
    pub short_description: String,
    /// Extended help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    /// Flags declared on this command (local and persistent).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FlagDescriptor>,
    /// Direct subcommands.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CommandNode>,
}

impl CommandNode {
    /// Creates a command with only a name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Sets the short description.
    pub fn with_short(mut self, short: &str) -> Self {
        self.short_description = short.to_string();
        self
    }

    /// Sets the long description.
    pub fn with_long(mut self, long: &str) -> Self {
        self.long_description = Some(long.to_string());
        self
    }

    /// Adds a flag.
    pub fn with_flag(mut self, flag: FlagDescriptor) -> Self {
        self.flags.push(flag);
        self
    }

    /// Adds a subcommand.
    pub fn with_child(mut self, child: CommandNode) -> Self {
        self.children.push(child);
        self
    }

    /// Finds a direct subcommand by name.
    pub fn find_child(&self, name: &str) -> Option<&CommandNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Finds a flag declared on this command by long name.
    pub fn find_flag(&self, name: &str) -> Option<&FlagDescriptor> {
        self.flags.iter().find(|flag| flag.name == name)
    }

    /// Long description, with `None` and `""` both reading as empty.
    pub fn long_text(&self) -> &str {
        self.long_description.as_deref().unwrap_or("")
    }

    /// Counts this command and all descendants.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(CommandNode::node_count).sum::<usize>()
    }
}

/// Parsed entrypoint reference.
///
/// Identifies the Go function that constructs the root command. See
/// `cobra_contract_introspect::entrypoint` for the parsing rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntrypointReference {
    /// Go import path of the package holding the function. Empty for
    /// references into the project's own `main` package.
    pub import_path: String,
    /// Identifier the target package is imported under. Empty when
    /// `import_path` is empty.
    pub import_alias: String,
    /// Constructor function name. Empty when no entrypoint was given.
    pub function_name: String,
    /// `true` when the function lives in the project's own `main` package.
    pub is_root_program_reference: bool,
}

impl EntrypointReference {
    /// Returns `true` for the "no explicit entrypoint" state.
    pub fn is_unspecified(&self) -> bool {
        self.function_name.is_empty()
    }

    /// Returns `true` when an import of the target package is required.
    pub fn needs_import(&self) -> bool {
        !self.import_path.is_empty()
    }

    /// Rewrites a module-relative import path against `module`.
    ///
    /// `pkg/cmd` and `./pkg/cmd` become `<module>/pkg/cmd`. Paths that
    /// already start with `module`, or whose first element looks like a
    /// host name (`github.com/...`), are kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use cobra_contract_core::EntrypointReference;
    ///
    /// let reference = EntrypointReference {
    ///     import_path: "./internal/cli".to_string(),
    ///     import_alias: "contracttarget".to_string(),
    ///     function_name: "NewRootCmd".to_string(),
    ///     is_root_program_reference: false,
    /// };
    /// let qualified = reference.qualified("example.com/app");
    /// assert_eq!(qualified.import_path, "example.com/app/internal/cli");
    /// ```
    pub fn qualified(&self, module: &str) -> Self {
        let mut out = self.clone();
        if !self.needs_import() || module.is_empty() {
            return out;
        }
        let relative = self.import_path.trim_start_matches("./");
        let in_module = relative == module
            || relative
                .strip_prefix(module)
                .is_some_and(|rest| rest.starts_with('/'));
        let external = relative
            .split('/')
            .next()
            .is_some_and(|first| first.contains('.'));
        out.import_path = if in_module || external {
            relative.to_string()
        } else {
            format!("{module}/{relative}")
        };
        out
    }
}

impl fmt::Display for EntrypointReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unspecified() {
            f.write_str("<auto>")
        } else if self.is_root_program_reference {
            write!(f, "main.{}", self.function_name)
        } else {
            write!(f, "{}.{}", self.import_path, self.function_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_type_round_trips_every_known_name() {
        for known in FlagType::ALL {
            assert_eq!(&FlagType::parse(known.as_str()), known);
            assert!(known.is_recognized());
        }
    }

    #[test]
    fn test_flag_type_keeps_unknown_identifier_verbatim() {
        let parsed = FlagType::parse("*cmd.colorValue");
        assert_eq!(parsed, FlagType::Unrecognized("*cmd.colorValue".to_string()));
        assert_eq!(parsed.to_string(), "*cmd.colorValue");
    }

    #[test]
    fn test_flag_serializes_type_as_plain_string() {
        let flag = FlagDescriptor::new("tags", FlagType::StringSlice).with_shorthand("t");
        let json = serde_json::to_value(&flag).unwrap();
        assert_eq!(json["type"], "stringSlice");
        assert_eq!(json["shorthand"], "t");
        assert_eq!(json["persistent"], false);
    }

    #[test]
    fn test_command_node_uses_camel_case_and_omits_empty_lists() {
        let node = CommandNode::new("app").with_short("demo").with_long("longer");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["shortDescription"], "demo");
        assert_eq!(json["longDescription"], "longer");
        assert!(json.get("flags").is_none());
        assert!(json.get("children").is_none());
    }

    #[test]
    fn test_command_node_deserializes_minimal_document() {
        let node: CommandNode = serde_json::from_str(r#"{"name":"app"}"#).unwrap();
        assert_eq!(node.name, "app");
        assert!(node.short_description.is_empty());
        assert_eq!(node.long_text(), "");
        assert!(node.flags.is_empty());
    }

    #[test]
    fn test_entrypoint_display() {
        let root = EntrypointReference {
            function_name: "NewRootCmd".to_string(),
            is_root_program_reference: true,
            ..Default::default()
        };
        assert_eq!(root.to_string(), "main.NewRootCmd");
        assert_eq!(EntrypointReference::default().to_string(), "<auto>");
    }

    #[test]
    fn test_entrypoint_qualified_keeps_full_paths() {
        let reference = EntrypointReference {
            import_path: "github.com/acme/tool/cmd".to_string(),
            import_alias: "contracttarget".to_string(),
            function_name: "Root".to_string(),
            is_root_program_reference: false,
        };
        assert_eq!(
            reference.qualified("example.com/app").import_path,
            "github.com/acme/tool/cmd"
        );

        let local = EntrypointReference {
            import_path: "app/cmd".to_string(),
            ..reference.clone()
        };
        assert_eq!(local.qualified("app").import_path, "app/cmd");

        let relative = EntrypointReference {
            import_path: "cmd".to_string(),
            ..reference
        };
        assert_eq!(relative.qualified("app").import_path, "app/cmd");
        assert_eq!(relative.qualified("").import_path, "cmd");
    }
}
