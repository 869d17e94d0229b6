//! Error types for introspection and orchestration.
//!
//! Each variant names the pipeline stage that failed. Toolchain failures
//! carry the captured output so callers can show what `go` reported.

use std::path::PathBuf;
use std::time::Duration;

use cobra_contract_loader::LoaderError;
use thiserror::Error;

use crate::synthesize::SynthesisError;

/// Bytes of raw program output kept in error messages.
const OUTPUT_PREVIEW_LEN: usize = 512;

/// Failures of the introspection pipeline.
#[derive(Debug, Error)]
pub enum IntrospectError {
    /// Entrypoint string cannot be turned into a reference.
    #[error("malformed entrypoint '{input}': {reason}")]
    MalformedEntrypoint { input: String, reason: String },

    /// Introspection program could not be rendered.
    #[error("failed to synthesize introspection program: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Ephemeral workspace or project manifest I/O failed.
    #[error("workspace error while {context}: {source}")]
    Workspace {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Toolchain binary could not be started.
    #[error("toolchain '{}' is unavailable: {source}", .program.display())]
    ToolchainUnavailable {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `go mod` step preparing the workspace module exited non-zero.
    #[error("toolchain failed while {step}:\n{output}")]
    ModuleSetup { step: String, output: String },

    /// Dependency resolution failed in both tolerant and strict modes.
    #[error("dependency resolution failed:\n{output}")]
    DependencyResolution { output: String },

    /// Introspection program failed to compile or exited non-zero.
    #[error("introspection program for '{entrypoint}' failed:\n{output}")]
    CompileOrRun { entrypoint: String, output: String },

    /// The configured time limit expired.
    #[error("introspection timed out after {0:?}")]
    Timeout(Duration),

    /// Program output is not a command tree.
    #[error("malformed introspection output ({source}): {}", preview(.raw))]
    MalformedOutput {
        raw: Vec<u8>,
        #[source]
        source: serde_json::Error,
    },
}

impl IntrospectError {
    pub(crate) fn malformed_entrypoint(input: &str, reason: impl Into<String>) -> Self {
        Self::MalformedEntrypoint {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn workspace(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Workspace {
            context: context.into(),
            source,
        }
    }
}

/// Failures of a full contract check, with stage context.
#[derive(Debug, Error)]
pub enum OrchestrateError {
    /// Contract could not be loaded.
    #[error(transparent)]
    Contract(#[from] LoaderError),

    /// Introspecting the project failed.
    #[error(
        "introspection of '{}' (entrypoint {entrypoint}) failed: {source}",
        .project.display()
    )]
    Introspect {
        project: PathBuf,
        entrypoint: String,
        #[source]
        source: IntrospectError,
    },
}

fn preview(raw: &[u8]) -> String {
    if raw.is_empty() {
        return "<empty>".to_string();
    }
    let text = String::from_utf8_lossy(raw);
    let mut end = text.len().min(OUTPUT_PREVIEW_LEN);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    if end < text.len() {
        format!("{}...", &text[..end])
    } else {
        text.into_owned()
    }
}

/// Convenience alias for results with [`IntrospectError`].
pub type Result<T> = std::result::Result<T, IntrospectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_output() {
        let raw = vec![b'x'; OUTPUT_PREVIEW_LEN + 10];
        let shown = preview(&raw);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.len(), OUTPUT_PREVIEW_LEN + 3);
    }

    #[test]
    fn test_preview_marks_empty_output() {
        assert_eq!(preview(b""), "<empty>");
    }

    #[test]
    fn test_timeout_message_names_duration() {
        let err = IntrospectError::Timeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "introspection timed out after 2s");
    }
}
