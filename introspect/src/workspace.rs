//! Ephemeral build workspace and target project discovery.
//!
//! Every introspection run builds in a fresh temporary directory that is
//! removed when the [`EphemeralWorkspace`] is dropped, whichever way the run
//! ends. The target project is never written to.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tempfile::TempDir;
use tracing::debug;

use crate::error::{IntrospectError, Result};
use crate::synthesize::RootSymbol;

/// Module path used when the target has no `go.mod`.
pub const STANDALONE_MODULE_PATH: &str = "cobracontract.local/introspect";

/// Last path element of the workspace module when nested under the target.
pub const WORKSPACE_MODULE_SUFFIX: &str = "cobracontractintrospect";

/// Prefix for root package files staged into the workspace.
pub const STAGED_FILE_PREFIX: &str = "target_";

/// Name the staged `func main()` is renamed to.
pub const RENAMED_MAIN: &str = "introspectOriginalMain";

/// Conventional constructors, in lookup order.
const ROOT_CONSTRUCTORS: &[&str] = &["NewRootCmd", "NewRootCommand", "newRootCmd", "newRootCommand"];

/// Conventional package-level variables, in lookup order.
const ROOT_VARIABLES: &[&str] = &["rootCmd", "RootCmd"];

static MODULE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*module\s+"?([^\s"/][^\s"]*)"?"#).expect("static regex must compile")
});

static PACKAGE_MAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^package\s+main\s*(?://.*)?$").expect("static regex must compile")
});

static FUNC_MAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^func\s+main\s*\(\s*\)").expect("static regex must compile")
});

/// Scoped temporary directory holding the synthesized module.
#[derive(Debug)]
pub struct EphemeralWorkspace {
    dir: TempDir,
}

impl EphemeralWorkspace {
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("cobra-contract-")
            .tempdir()
            .map_err(|e| IntrospectError::workspace("creating ephemeral workspace", e))?;
        debug!(path = %dir.path().display(), "Created ephemeral workspace");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes `contents` to `name` inside the workspace.
    pub fn write_file(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, contents)
            .map_err(|e| IntrospectError::workspace(format!("writing {name}"), e))?;
        Ok(path)
    }

    /// Removes the workspace, reporting cleanup failures.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| {
            IntrospectError::workspace(format!("removing {}", path.display()), e)
        })
    }
}

/// Location and module identity of the target project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectManifest {
    /// Canonical project directory as given by the caller.
    pub project_dir: PathBuf,
    /// Directory holding the nearest `go.mod`, if any.
    pub module_root: Option<PathBuf>,
    /// Module path declared in that `go.mod`.
    pub module_path: Option<String>,
}

impl ProjectManifest {
    /// Resolves `project` and walks up to the nearest `go.mod`.
    ///
    /// A project without a `go.mod` is allowed; it yields no module identity
    /// and no replace directive.
    pub fn discover(project: impl AsRef<Path>) -> Result<Self> {
        let project = project.as_ref();
        let project_dir = project.canonicalize().map_err(|e| {
            IntrospectError::workspace(format!("resolving project {}", project.display()), e)
        })?;
        if !project_dir.is_dir() {
            return Err(IntrospectError::workspace(
                format!("resolving project {}", project.display()),
                std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }

        for dir in project_dir.ancestors() {
            let go_mod = dir.join("go.mod");
            if !go_mod.is_file() {
                continue;
            }
            let contents = fs::read_to_string(&go_mod)
                .map_err(|e| IntrospectError::workspace(format!("reading {}", go_mod.display()), e))?;
            let module_path = parse_module_path(&contents);
            debug!(
                go_mod = %go_mod.display(),
                module = module_path.as_deref().unwrap_or("<none>"),
                "Found project manifest"
            );
            return Ok(Self {
                project_dir: project_dir.clone(),
                module_root: Some(dir.to_path_buf()),
                module_path,
            });
        }

        debug!(project = %project_dir.display(), "No go.mod above project");
        Ok(Self {
            project_dir,
            module_root: None,
            module_path: None,
        })
    }

    /// Module path for the ephemeral workspace.
    ///
    /// Nested under the target module so its `internal/` packages are
    /// importable.
    pub fn workspace_module_path(&self) -> String {
        match &self.module_path {
            Some(module) => format!("{module}/{WORKSPACE_MODULE_SUFFIX}"),
            None => STANDALONE_MODULE_PATH.to_string(),
        }
    }
}

/// Extracts the module path from `go.mod` contents.
pub fn parse_module_path(go_mod: &str) -> Option<String> {
    MODULE_LINE
        .captures(go_mod)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Copies the project's `package main` sources into the workspace.
///
/// Test files are skipped and `func main()` is renamed to
/// [`RENAMED_MAIN`] so the synthesized `main` can coexist with them.
/// Returns the staged file paths.
pub fn stage_root_package(project_dir: &Path, workspace: &EphemeralWorkspace) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(project_dir).map_err(|e| {
        IntrospectError::workspace(format!("listing {}", project_dir.display()), e)
    })?;

    let mut sources: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".go") && !n.ends_with("_test.go"))
        })
        .collect();
    sources.sort();

    let mut staged = Vec::new();
    for source in sources {
        let contents = fs::read_to_string(&source)
            .map_err(|e| IntrospectError::workspace(format!("reading {}", source.display()), e))?;
        if !PACKAGE_MAIN.is_match(&contents) {
            continue;
        }
        let Some(file_name) = source.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let renamed = FUNC_MAIN.replace_all(&contents, format!("func {RENAMED_MAIN}()"));
        let target = format!("{STAGED_FILE_PREFIX}{file_name}");
        staged.push(workspace.write_file(&target, &renamed)?);
    }

    debug!(count = staged.len(), "Staged root package sources");
    Ok(staged)
}

/// Finds a conventional root command in staged sources.
///
/// Constructors win over variables; within each group the first name in
/// lookup order that appears anywhere is chosen.
pub fn scan_root_symbol(staged: &[PathBuf]) -> Result<Option<RootSymbol>> {
    let mut combined = String::new();
    for path in staged {
        let contents = fs::read_to_string(path)
            .map_err(|e| IntrospectError::workspace(format!("reading {}", path.display()), e))?;
        combined.push_str(&contents);
        combined.push('\n');
    }
    Ok(find_root_symbol(&combined))
}

fn find_root_symbol(source: &str) -> Option<RootSymbol> {
    for name in ROOT_CONSTRUCTORS {
        let pattern = format!(r"(?m)^func\s+{name}\s*\(\s*\)\s*\*cobra\.Command\b");
        if Regex::new(&pattern).is_ok_and(|re| re.is_match(source)) {
            return Some(RootSymbol::Constructor((*name).to_string()));
        }
    }
    for name in ROOT_VARIABLES {
        let declared = format!(r"(?m)^\s*(?:var\s+)?{name}\s*(?:=|\*cobra\.Command)");
        if Regex::new(&declared).is_ok_and(|re| re.is_match(source)) {
            return Some(RootSymbol::Variable((*name).to_string()));
        }
    }
    None
}
