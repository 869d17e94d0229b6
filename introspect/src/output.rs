//! Output formatting for check reports and observed trees.

use chrono::Utc;
use cobra_contract_core::{CommandNode, Discrepancy, ValidationOutcome};
use serde::Serialize;

use crate::orchestrate::CheckReport;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Json,
    Yaml,
    Markdown,
    Table,
}

/// Report envelope for machine-readable formats.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderedReport<'a> {
    generated_at: String,
    #[serde(flatten)]
    report: &'a CheckReport,
}

/// Formats a check report in the requested output format.
pub fn format_report(report: &CheckReport, format: OutputFormat) -> Result<String, String> {
    let rendered = RenderedReport {
        generated_at: Utc::now().to_rfc3339(),
        report,
    };
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&rendered)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(&rendered).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Markdown => Ok(report_to_markdown(report)),
        OutputFormat::Table => Ok(report_to_table(report)),
    }
}

/// Formats an observed tree. Only JSON and YAML produce a loadable
/// contract; the other formats fall back to YAML.
pub fn format_tree(tree: &CommandNode, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(tree)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml | OutputFormat::Markdown | OutputFormat::Table => {
            serde_yaml::to_string(tree).map_err(|e| format!("YAML serialization failed: {e}"))
        }
    }
}

fn status_label(report: &CheckReport) -> &'static str {
    if report.success { "PASSED" } else { "FAILED" }
}

fn value_or_dash(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        Some(_) => "\"\"",
        None => "-",
    }
}

fn grouped(report: &CheckReport) -> ValidationOutcome {
    ValidationOutcome::from_discrepancies(report.discrepancies.clone())
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn report_to_markdown(report: &CheckReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("# Contract check {}\n\n", status_label(report)));
    out.push_str(&format!(
        "**Contract root:** `{}`  **Observed root:** `{}`\n\n",
        report.contract_root, report.observed_root
    ));

    if report.discrepancies.is_empty() {
        out.push_str("No discrepancies found.\n");
        return out;
    }

    out.push_str(&format!(
        "**Discrepancies:** {}\n\n",
        report.discrepancies.len()
    ));

    let outcome = grouped(report);
    for (kind, items) in outcome.grouped() {
        out.push_str(&format!("## {kind} ({})\n\n", items.len()));
        out.push_str("| Path | Expected | Actual | Message |\n");
        out.push_str("|------|----------|--------|---------|\n");
        for d in items {
            out.push_str(&format!(
                "| `{}` | {} | {} | {} |\n",
                d.path,
                escape_cell(value_or_dash(d.expected.as_deref())),
                escape_cell(value_or_dash(d.actual.as_deref())),
                escape_cell(&d.message)
            ));
        }
        out.push('\n');
    }

    out
}

fn report_to_table(report: &CheckReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Contract check {}  Contract root: {}  Observed root: {}  Discrepancies: {}\n",
        status_label(report),
        report.contract_root,
        report.observed_root,
        report.discrepancies.len()
    ));

    let outcome = grouped(report);
    for (kind, items) in outcome.grouped() {
        out.push_str(&format!("\n{kind} ({}):\n", items.len()));
        let max_path = items.iter().map(|d| d.path.len()).max().unwrap_or(4);
        for d in items {
            out.push_str(&format!(
                "  {:<width$}  {}{}\n",
                d.path,
                d.message,
                expected_actual(d),
                width = max_path
            ));
        }
    }

    out
}

fn expected_actual(d: &Discrepancy) -> String {
    if d.expected.is_none() && d.actual.is_none() {
        return String::new();
    }
    format!(
        " (expected: {}, actual: {})",
        value_or_dash(d.expected.as_deref()),
        value_or_dash(d.actual.as_deref())
    )
}
