//! End-to-end contract checks.
//!
//! Sequences the pipeline: load the contract, introspect the project, and
//! diff the two trees. Errors carry the stage that failed and the inputs it
//! was working on.

use std::path::PathBuf;
use std::time::Duration;

use cobra_contract_core::{Discrepancy, validate};
use cobra_contract_loader::load_contract;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::{InspectConfig, Inspector};
use crate::error::OrchestrateError;
use crate::toolchain::Toolchain;

/// Inputs for one contract check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCheck {
    /// Target project directory.
    pub project: PathBuf,
    /// Contract file (JSON or YAML).
    pub contract: PathBuf,
    /// Entrypoint reference; empty for automatic discovery.
    pub entrypoint: String,
    /// Overrides the inspector's time limit when set.
    pub timeout: Option<Duration>,
}

/// Outcome of a contract check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    /// `true` iff no discrepancies were found.
    pub success: bool,
    pub discrepancies: Vec<Discrepancy>,
    /// Root command name declared by the contract.
    pub contract_root: String,
    /// Root command name observed in the project.
    pub observed_root: String,
}

/// Runs a full contract check.
///
/// Discrepancies are part of a successful return; only pipeline failures
/// are errors.
pub fn orchestrate<T: Toolchain>(
    inspector: &Inspector<T>,
    check: &ContractCheck,
) -> Result<CheckReport, OrchestrateError> {
    let contract = load_contract(&check.contract)?;

    let observed = match check.timeout {
        Some(timeout) if Some(timeout) != inspector.config().timeout => {
            let config = InspectConfig {
                timeout: Some(timeout),
                ..*inspector.config()
            };
            Inspector::new(inspector.toolchain(), config).inspect(&check.project, &check.entrypoint)
        }
        _ => inspector.inspect(&check.project, &check.entrypoint),
    }
    .map_err(|source| OrchestrateError::Introspect {
        project: check.project.clone(),
        entrypoint: display_entrypoint(&check.entrypoint),
        source,
    })?;

    let outcome = validate(&contract, &observed);
    info!(
        contract = %check.contract.display(),
        valid = outcome.valid,
        discrepancies = outcome.discrepancies.len(),
        "Contract check finished"
    );

    Ok(CheckReport {
        success: outcome.valid,
        discrepancies: outcome.discrepancies,
        contract_root: contract.name,
        observed_root: observed.name,
    })
}

fn display_entrypoint(entrypoint: &str) -> String {
    if entrypoint.trim().is_empty() {
        "<auto>".to_string()
    } else {
        entrypoint.to_string()
    }
}
