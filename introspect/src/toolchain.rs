//! Host toolchain capabilities.
//!
//! The engine needs four things from the Go toolchain: create a module,
//! point a dependency at a local directory, resolve dependencies, and build
//! and run the program. [`Toolchain`] names those capabilities so tests can
//! substitute a scripted implementation for the real `go` binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::process::{ProcessError, RunLimits, run_bounded};

/// Default toolchain binary, resolved through `PATH`.
pub const DEFAULT_GO_BINARY: &str = "go";

/// How strictly dependency resolution treats errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Keep going past unresolvable imports (`go mod tidy -e`).
    Tolerant,
    /// Fail on the first unresolvable import (`go mod tidy`).
    Strict,
}

/// Result of one toolchain invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    /// Combined output for error reports, stderr first.
    pub fn combined_text(&self) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        let stdout = String::from_utf8_lossy(&self.stdout);
        match (stderr.trim().is_empty(), stdout.trim().is_empty()) {
            (false, false) => format!("{}\n{}", stderr.trim_end(), stdout.trim_end()),
            (false, true) => stderr.trim_end().to_string(),
            (true, false) => stdout.trim_end().to_string(),
            (true, true) => match self.code {
                Some(code) => format!("<no output, exit code {code}>"),
                None => "<no output, terminated by signal>".to_string(),
            },
        }
    }
}

impl From<crate::process::ProcessOutput> for ToolOutput {
    fn from(output: crate::process::ProcessOutput) -> Self {
        Self {
            success: output.status.success(),
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Capabilities the engine requires of the host toolchain.
pub trait Toolchain {
    /// Binary or label used in error messages.
    fn program(&self) -> &Path;

    fn init_module(
        &self,
        dir: &Path,
        module_path: &str,
        limits: RunLimits,
    ) -> Result<ToolOutput, ProcessError>;

    fn replace_module(
        &self,
        dir: &Path,
        module_path: &str,
        target: &Path,
        limits: RunLimits,
    ) -> Result<ToolOutput, ProcessError>;

    fn resolve_dependencies(
        &self,
        dir: &Path,
        mode: ResolveMode,
        limits: RunLimits,
    ) -> Result<ToolOutput, ProcessError>;

    fn run_program(&self, dir: &Path, limits: RunLimits) -> Result<ToolOutput, ProcessError>;
}

impl<T: Toolchain + ?Sized> Toolchain for &T {
    fn program(&self) -> &Path {
        (**self).program()
    }

    fn init_module(
        &self,
        dir: &Path,
        module_path: &str,
        limits: RunLimits,
    ) -> Result<ToolOutput, ProcessError> {
        (**self).init_module(dir, module_path, limits)
    }

    fn replace_module(
        &self,
        dir: &Path,
        module_path: &str,
        target: &Path,
        limits: RunLimits,
    ) -> Result<ToolOutput, ProcessError> {
        (**self).replace_module(dir, module_path, target, limits)
    }

    fn resolve_dependencies(
        &self,
        dir: &Path,
        mode: ResolveMode,
        limits: RunLimits,
    ) -> Result<ToolOutput, ProcessError> {
        (**self).resolve_dependencies(dir, mode, limits)
    }

    fn run_program(&self, dir: &Path, limits: RunLimits) -> Result<ToolOutput, ProcessError> {
        (**self).run_program(dir, limits)
    }
}

/// The `go` command.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    binary: PathBuf,
}

impl GoToolchain {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, dir: &Path, args: &[&str]) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .current_dir(dir)
            // The workspace is a standalone module even inside a go.work tree.
            .env("GOWORK", "off")
            .env("GO111MODULE", "on");
        command
    }

    fn run(&self, dir: &Path, args: &[&str], limits: RunLimits) -> Result<ToolOutput, ProcessError> {
        debug!(go = %self.binary.display(), ?args, dir = %dir.display(), "Running toolchain");
        let output = run_bounded(self.command(dir, args), limits)?;
        Ok(output.into())
    }
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new(DEFAULT_GO_BINARY)
    }
}

impl Toolchain for GoToolchain {
    fn program(&self) -> &Path {
        &self.binary
    }

    fn init_module(
        &self,
        dir: &Path,
        module_path: &str,
        limits: RunLimits,
    ) -> Result<ToolOutput, ProcessError> {
        self.run(dir, &["mod", "init", module_path], limits)
    }

    fn replace_module(
        &self,
        dir: &Path,
        module_path: &str,
        target: &Path,
        limits: RunLimits,
    ) -> Result<ToolOutput, ProcessError> {
        let directive = format!("-replace={module_path}={}", target.display());
        self.run(dir, &["mod", "edit", &directive], limits)
    }

    fn resolve_dependencies(
        &self,
        dir: &Path,
        mode: ResolveMode,
        limits: RunLimits,
    ) -> Result<ToolOutput, ProcessError> {
        match mode {
            ResolveMode::Tolerant => self.run(dir, &["mod", "tidy", "-e"], limits),
            ResolveMode::Strict => self.run(dir, &["mod", "tidy"], limits),
        }
    }

    fn run_program(&self, dir: &Path, limits: RunLimits) -> Result<ToolOutput, ProcessError> {
        self.run(dir, &["run", "."], limits)
    }
}
