//! Isolated execution of the introspection program.
//!
//! [`Inspector::execute`] builds a fresh module in an ephemeral workspace,
//! points it at the target project, resolves dependencies, and runs the
//! synthesized program. All toolchain invocations of one run share a single
//! deadline. The workspace is removed whether the run succeeds, fails, or
//! times out.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use cobra_contract_introspect::{InspectConfig, Inspector, GoToolchain};
//!
//! let inspector = Inspector::new(
//!     GoToolchain::default(),
//!     InspectConfig::default().with_timeout(Some(Duration::from_secs(120))),
//! );
//! let tree = inspector.inspect("path/to/project", "main.NewRootCmd").unwrap();
//! println!("{} commands", tree.node_count());
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use cobra_contract_core::{CommandNode, EntrypointReference};
use tracing::{debug, info, warn};

use crate::decode::decode_tree;
use crate::entrypoint::resolve_entrypoint;
use crate::error::{IntrospectError, Result};
use crate::process::{DEFAULT_GRACE_PERIOD, ProcessError, RunLimits};
use crate::synthesize::{
    FALLBACK_FILE, PROGRAM_FILE, SynthesizedProgram, render_fallback_shim, synthesize_program,
};
use crate::toolchain::{ResolveMode, ToolOutput, Toolchain};
use crate::workspace::{EphemeralWorkspace, ProjectManifest, scan_root_symbol, stage_root_package};

/// Timer settings for an introspection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectConfig {
    /// Overall limit for all toolchain invocations. `None` or zero disables
    /// the timer.
    pub timeout: Option<Duration>,
    /// Wait between interrupt and kill once the limit expires.
    pub grace_period: Duration,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl InspectConfig {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

/// Shared deadline across the invocations of one run.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    configured: Option<Duration>,
    expires: Option<Instant>,
    grace: Duration,
}

impl Deadline {
    fn start(config: &InspectConfig) -> Self {
        let configured = config.timeout.filter(|t| !t.is_zero());
        Self {
            configured,
            expires: configured.map(|t| Instant::now() + t),
            grace: config.grace_period,
        }
    }

    fn limits(&self) -> Result<RunLimits> {
        let timeout = match (self.expires, self.configured) {
            (Some(expires), Some(configured)) => {
                let remaining = expires.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(IntrospectError::Timeout(configured));
                }
                Some(remaining)
            }
            _ => None,
        };
        Ok(RunLimits {
            timeout,
            grace: self.grace,
        })
    }
}

/// Runs introspection programs against Go projects.
#[derive(Debug, Clone)]
pub struct Inspector<T: Toolchain> {
    toolchain: T,
    config: InspectConfig,
}

impl<T: Toolchain> Inspector<T> {
    pub fn new(toolchain: T, config: InspectConfig) -> Self {
        Self { toolchain, config }
    }

    pub fn config(&self) -> &InspectConfig {
        &self.config
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Resolves `entrypoint`, runs the introspection program, and decodes
    /// the observed tree.
    pub fn inspect(&self, project: impl AsRef<Path>, entrypoint: &str) -> Result<CommandNode> {
        let reference = resolve_entrypoint(entrypoint)?;
        let manifest = ProjectManifest::discover(project)?;
        let reference = match &manifest.module_path {
            Some(module) => reference.qualified(module),
            None => reference,
        };
        info!(
            project = %manifest.project_dir.display(),
            entrypoint = %reference,
            "Introspecting command tree"
        );

        let program = synthesize_program(&reference)?;
        let stdout = self.execute(&manifest, &reference, &program)?;
        let tree = decode_tree(&stdout)?;
        debug!(root = %tree.name, commands = tree.node_count(), "Decoded observed tree");
        Ok(tree)
    }

    /// Builds and runs `program` in a fresh workspace and returns its stdout.
    ///
    /// # Errors
    ///
    /// - [`IntrospectError::Workspace`] when workspace or staging I/O fails
    /// - [`IntrospectError::ToolchainUnavailable`] when the toolchain cannot
    ///   be started
    /// - [`IntrospectError::ModuleSetup`] when `go mod init` or the replace
    ///   directive fails
    /// - [`IntrospectError::DependencyResolution`] when both tolerant and
    ///   strict resolution fail
    /// - [`IntrospectError::CompileOrRun`] when the program fails to build or
    ///   exits non-zero
    /// - [`IntrospectError::Timeout`] when the configured limit expires
    pub fn execute(
        &self,
        manifest: &ProjectManifest,
        reference: &EntrypointReference,
        program: &SynthesizedProgram,
    ) -> Result<Vec<u8>> {
        let workspace = EphemeralWorkspace::create()?;
        let result = self.execute_in(&workspace, manifest, reference, program);
        match (result, workspace.close()) {
            (Ok(stdout), Ok(())) => Ok(stdout),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(err), cleanup) => {
                if let Err(cleanup) = cleanup {
                    warn!(error = %cleanup, "Failed to remove workspace after error");
                }
                Err(err)
            }
        }
    }

    fn execute_in(
        &self,
        workspace: &EphemeralWorkspace,
        manifest: &ProjectManifest,
        reference: &EntrypointReference,
        program: &SynthesizedProgram,
    ) -> Result<Vec<u8>> {
        let deadline = Deadline::start(&self.config);
        let dir = workspace.path();

        let module = manifest.workspace_module_path();
        let init = self.invoke(self.toolchain.init_module(dir, &module, deadline.limits()?), &deadline)?;
        if !init.success {
            return Err(IntrospectError::ModuleSetup {
                step: format!("initializing module {module}"),
                output: init.combined_text(),
            });
        }

        if let (Some(module_path), Some(module_root)) = (&manifest.module_path, &manifest.module_root) {
            let replaced = self.invoke(
                self.toolchain
                    .replace_module(dir, module_path, module_root, deadline.limits()?),
                &deadline,
            )?;
            if !replaced.success {
                return Err(IntrospectError::ModuleSetup {
                    step: format!("registering replace for {module_path}"),
                    output: replaced.combined_text(),
                });
            }
        }

        if reference.is_root_program_reference {
            let staged = stage_root_package(&manifest.project_dir, workspace)?;
            if program.needs_fallback {
                let symbol = scan_root_symbol(&staged)?;
                debug!(?symbol, "Fallback root symbol");
                workspace.write_file(FALLBACK_FILE, &render_fallback_shim(symbol.as_ref())?)?;
            }
        } else if program.needs_fallback {
            workspace.write_file(FALLBACK_FILE, &render_fallback_shim(None)?)?;
        }
        workspace.write_file(PROGRAM_FILE, &program.source)?;

        self.resolve_dependencies(dir, &deadline)?;

        let run = self.invoke(self.toolchain.run_program(dir, deadline.limits()?), &deadline)?;
        if !run.success {
            return Err(IntrospectError::CompileOrRun {
                entrypoint: reference.to_string(),
                output: run.combined_text(),
            });
        }
        if !run.stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&run.stderr), "Introspection program diagnostics");
        }
        Ok(run.stdout)
    }

    /// Tolerant resolution first; a single strict retry on failure.
    fn resolve_dependencies(&self, dir: &Path, deadline: &Deadline) -> Result<()> {
        let tolerant = self.invoke(
            self.toolchain
                .resolve_dependencies(dir, ResolveMode::Tolerant, deadline.limits()?),
            deadline,
        )?;
        if tolerant.success {
            return Ok(());
        }
        debug!(
            output = %tolerant.combined_text(),
            "Tolerant dependency resolution failed, retrying strictly"
        );

        let strict = self.invoke(
            self.toolchain
                .resolve_dependencies(dir, ResolveMode::Strict, deadline.limits()?),
            deadline,
        )?;
        if strict.success {
            return Ok(());
        }
        Err(IntrospectError::DependencyResolution {
            output: strict.combined_text(),
        })
    }

    fn invoke(
        &self,
        outcome: std::result::Result<ToolOutput, ProcessError>,
        deadline: &Deadline,
    ) -> Result<ToolOutput> {
        outcome.map_err(|err| match err {
            ProcessError::TimedOut { after, .. } => {
                IntrospectError::Timeout(deadline.configured.unwrap_or(after))
            }
            ProcessError::Spawn { source, .. } => IntrospectError::ToolchainUnavailable {
                program: self.toolchain.program().to_path_buf(),
                source,
            },
            ProcessError::Wait { program, source } => {
                IntrospectError::workspace(format!("waiting for {program}"), source)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Init(String),
        Replace(String, PathBuf),
        Resolve(ResolveMode),
        Run,
    }

    /// Scripted toolchain: records calls and replays queued results.
    #[derive(Default)]
    struct FakeToolchain {
        calls: RefCell<Vec<Call>>,
        init_result: RefCell<Option<ToolOutput>>,
        resolve_results: RefCell<VecDeque<bool>>,
        run_result: RefCell<Option<std::result::Result<ToolOutput, ProcessError>>>,
        seen_files: RefCell<Vec<String>>,
    }

    fn ok(stdout: &str) -> ToolOutput {
        ToolOutput {
            success: true,
            code: Some(0),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        }
    }

    fn failed(stderr: &str) -> ToolOutput {
        ToolOutput {
            success: false,
            code: Some(1),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    impl Toolchain for FakeToolchain {
        fn program(&self) -> &Path {
            Path::new("fake-go")
        }

        fn init_module(
            &self,
            _dir: &Path,
            module_path: &str,
            _limits: RunLimits,
        ) -> std::result::Result<ToolOutput, ProcessError> {
            self.calls.borrow_mut().push(Call::Init(module_path.to_string()));
            Ok(self.init_result.borrow_mut().take().unwrap_or_else(|| ok("")))
        }

        fn replace_module(
            &self,
            _dir: &Path,
            module_path: &str,
            target: &Path,
            _limits: RunLimits,
        ) -> std::result::Result<ToolOutput, ProcessError> {
            self.calls
                .borrow_mut()
                .push(Call::Replace(module_path.to_string(), target.to_path_buf()));
            Ok(ok(""))
        }

        fn resolve_dependencies(
            &self,
            _dir: &Path,
            mode: ResolveMode,
            _limits: RunLimits,
        ) -> std::result::Result<ToolOutput, ProcessError> {
            self.calls.borrow_mut().push(Call::Resolve(mode));
            let success = self.resolve_results.borrow_mut().pop_front().unwrap_or(true);
            Ok(if success { ok("") } else { failed("missing module") })
        }

        fn run_program(
            &self,
            dir: &Path,
            _limits: RunLimits,
        ) -> std::result::Result<ToolOutput, ProcessError> {
            self.calls.borrow_mut().push(Call::Run);
            let mut files: Vec<String> = std::fs::read_dir(dir)
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect();
            files.sort();
            *self.seen_files.borrow_mut() = files;
            self.run_result
                .borrow_mut()
                .take()
                .unwrap_or_else(|| Ok(ok(r#"{"name":"app","flags":[]}"#)))
        }
    }

    fn go_project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/app\n").unwrap();
        std::fs::write(
            dir.path().join("main.go"),
            "package main\n\nvar rootCmd = &cobra.Command{Use: \"app\"}\n\nfunc main() {}\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_inspect_runs_pipeline_in_order() {
        let project = go_project();
        let inspector = Inspector::new(FakeToolchain::default(), InspectConfig::default());
        let tree = inspector.inspect(project.path(), "pkg/cli.NewRootCmd").unwrap();
        assert_eq!(tree.name, "app");

        let calls = inspector.toolchain().calls.borrow().clone();
        assert_eq!(
            calls,
            vec![
                Call::Init("example.com/app/cobracontractintrospect".to_string()),
                Call::Replace(
                    "example.com/app".to_string(),
                    project.path().canonicalize().unwrap()
                ),
                Call::Resolve(ResolveMode::Tolerant),
                Call::Run,
            ]
        );
        assert_eq!(*inspector.toolchain().seen_files.borrow(), vec!["main.go"]);
    }

    #[test]
    fn test_unspecified_entrypoint_stages_root_package_with_fallback() {
        let project = go_project();
        let inspector = Inspector::new(FakeToolchain::default(), InspectConfig::default());
        inspector.inspect(project.path(), "").unwrap();

        assert_eq!(
            *inspector.toolchain().seen_files.borrow(),
            vec!["introspect_fallback.go", "main.go", "target_main.go"]
        );
    }

    #[test]
    fn test_strict_retry_after_tolerant_failure() {
        let project = go_project();
        let toolchain = FakeToolchain::default();
        toolchain.resolve_results.borrow_mut().extend([false, true]);
        let inspector = Inspector::new(toolchain, InspectConfig::default());
        inspector.inspect(project.path(), "main.NewRootCmd").unwrap();

        let calls = inspector.toolchain().calls.borrow().clone();
        assert!(calls.contains(&Call::Resolve(ResolveMode::Tolerant)));
        assert!(calls.contains(&Call::Resolve(ResolveMode::Strict)));
    }

    #[test]
    fn test_dependency_failure_after_strict_retry() {
        let project = go_project();
        let toolchain = FakeToolchain::default();
        toolchain.resolve_results.borrow_mut().extend([false, false]);
        let inspector = Inspector::new(toolchain, InspectConfig::default());

        let err = inspector.inspect(project.path(), "main.NewRootCmd").unwrap_err();
        assert!(matches!(
            err,
            IntrospectError::DependencyResolution { ref output } if output == "missing module"
        ));
        assert!(!inspector.toolchain().calls.borrow().contains(&Call::Run));
    }

    #[test]
    fn test_program_failure_is_compile_or_run() {
        let project = go_project();
        let toolchain = FakeToolchain::default();
        *toolchain.run_result.borrow_mut() = Some(Ok(failed("undefined: NewRootCmd")));
        let inspector = Inspector::new(toolchain, InspectConfig::default());

        match inspector.inspect(project.path(), "main.NewRootCmd").unwrap_err() {
            IntrospectError::CompileOrRun { entrypoint, output } => {
                assert_eq!(entrypoint, "main.NewRootCmd");
                assert_eq!(output, "undefined: NewRootCmd");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_module_init_failure_carries_toolchain_output() {
        let project = go_project();
        let toolchain = FakeToolchain::default();
        *toolchain.init_result.borrow_mut() = Some(failed("go: invalid module path"));
        let inspector = Inspector::new(toolchain, InspectConfig::default());

        match inspector.inspect(project.path(), "main.NewRootCmd").unwrap_err() {
            IntrospectError::ModuleSetup { step, output } => {
                assert!(step.starts_with("initializing module"), "{step}");
                assert_eq!(output, "go: invalid module path");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(inspector.toolchain().calls.borrow().len(), 1);
    }

    #[test]
    fn test_process_timeout_reports_configured_duration() {
        let project = go_project();
        let toolchain = FakeToolchain::default();
        *toolchain.run_result.borrow_mut() = Some(Err(ProcessError::TimedOut {
            program: "fake-go".to_string(),
            after: Duration::from_millis(12),
        }));
        let config = InspectConfig::default().with_timeout(Some(Duration::from_secs(30)));
        let inspector = Inspector::new(toolchain, config);

        let err = inspector.inspect(project.path(), "main.NewRootCmd").unwrap_err();
        assert!(matches!(err, IntrospectError::Timeout(d) if d == Duration::from_secs(30)));
    }

    #[test]
    fn test_malformed_program_output() {
        let project = go_project();
        let toolchain = FakeToolchain::default();
        *toolchain.run_result.borrow_mut() = Some(Ok(ok("not json")));
        let inspector = Inspector::new(toolchain, InspectConfig::default());

        let err = inspector.inspect(project.path(), "main.NewRootCmd").unwrap_err();
        assert!(matches!(err, IntrospectError::MalformedOutput { .. }));
    }

    #[test]
    fn test_malformed_entrypoint_runs_nothing() {
        let project = go_project();
        let inspector = Inspector::new(FakeToolchain::default(), InspectConfig::default());
        let err = inspector.inspect(project.path(), "NewRootCmd").unwrap_err();
        assert!(matches!(err, IntrospectError::MalformedEntrypoint { .. }));
        assert!(inspector.toolchain().calls.borrow().is_empty());
    }

    #[test]
    fn test_zero_timeout_disables_timer() {
        let config = InspectConfig::default().with_timeout(Some(Duration::ZERO));
        assert_eq!(config.timeout, None);
        let limits = Deadline::start(&config).limits().unwrap();
        assert_eq!(limits.timeout, None);
    }

    #[test]
    fn test_expired_deadline_fails_before_invoking() {
        let deadline = Deadline {
            configured: Some(Duration::from_millis(5)),
            expires: Some(Instant::now()),
            grace: DEFAULT_GRACE_PERIOD,
        };
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(
            deadline.limits(),
            Err(IntrospectError::Timeout(d)) if d == Duration::from_millis(5)
        ));
    }
}
