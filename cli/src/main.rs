use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};
use cobra_contract_core::CommandNode;
use cobra_contract_introspect::{
    ContractCheck, DEFAULT_GO_BINARY, DEFAULT_GRACE_PERIOD, GoToolchain, InspectConfig, Inspector,
    OutputFormat, format_report, format_tree, orchestrate,
};
use cobra_contract_loader::{PROJECT_CONFIG_FILE, ProjectConfig, load_contract};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code when the contract check found discrepancies.
const EXIT_DISCREPANCIES: i32 = 1;

/// Exit code when the pipeline itself failed.
const EXIT_ERROR: i32 = 2;

/// Formats accepted by `inspect`.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum TreeFormat {
    Json,
    Yaml,
}

impl From<TreeFormat> for OutputFormat {
    fn from(fmt: TreeFormat) -> Self {
        match fmt {
            TreeFormat::Json => Self::Json,
            TreeFormat::Yaml => Self::Yaml,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "cobra-contract", version = PACKAGE_VERSION)]
#[command(about = "Check a Go/cobra CLI against its declared command contract")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Introspect a project and diff its command tree against a contract.
    Validate(ValidateArgs),
    /// Introspect a project and print its observed command tree.
    Inspect(InspectArgs),
    /// Load and structure-check one or more contract files.
    CheckContract(CheckContractArgs),
}

#[derive(Debug, Args)]
struct TargetArgs {
    /// Go project directory.
    #[arg(long, default_value = ".")]
    project: PathBuf,
    /// Entrypoint such as main.NewRootCmd or example.com/app/cmd.NewRootCmd.
    /// Omit to discover a conventional root in package main.
    #[arg(long)]
    entrypoint: Option<String>,
    /// Overall time limit in seconds (0 disables the limit).
    #[arg(long)]
    timeout: Option<u64>,
    /// Seconds between interrupt and kill after the time limit.
    #[arg(long)]
    grace: Option<u64>,
    /// Go toolchain binary.
    #[arg(long = "go", env = "COBRA_CONTRACT_GO")]
    go_binary: Option<PathBuf>,
    /// Project config file (default: <project>/.cobra-contract.yml).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Contract file (JSON or YAML).
    #[arg(long)]
    contract: Option<PathBuf>,
    /// Report format.
    #[arg(long, default_value = "table")]
    format: OutputFormat,
    /// Write the report to a file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct InspectArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Tree format.
    #[arg(long, default_value = "yaml")]
    format: TreeFormat,
    /// Write the tree to a file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CheckContractArgs {
    /// Contract files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

/// Effective settings after merging flags, config, and defaults.
#[derive(Debug)]
struct Settings {
    project: PathBuf,
    contract: Option<PathBuf>,
    entrypoint: String,
    timeout: Option<Duration>,
    grace: Duration,
    go_binary: PathBuf,
}

impl Settings {
    fn inspector(&self) -> Inspector<GoToolchain> {
        Inspector::new(
            GoToolchain::new(&self.go_binary),
            InspectConfig::default()
                .with_timeout(self.timeout)
                .with_grace_period(self.grace),
        )
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Inspect(args) => run_inspect(args).map(|()| true),
        Command::CheckContract(args) => run_check_contract(args),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_DISCREPANCIES),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(EXIT_ERROR);
        }
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_settings(target: &TargetArgs, contract: Option<&Path>) -> Result<Settings, String> {
    let config = match &target.config {
        Some(path) => ProjectConfig::load(path)
            .map_err(|e| format!("failed to load config '{}': {e}", path.display()))?,
        None => ProjectConfig::discover(&target.project).map_err(|e| {
            format!(
                "failed to load {} in '{}': {e}",
                PROJECT_CONFIG_FILE,
                target.project.display()
            )
        })?,
    };
    debug!(?config, "Project config");

    let timeout = match target.timeout {
        Some(secs) => (secs > 0).then(|| Duration::from_secs(secs)),
        None => config.timeout(),
    };
    let grace = target
        .grace
        .or(config.grace_secs)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_GRACE_PERIOD);

    Ok(Settings {
        project: target.project.clone(),
        contract: contract
            .map(Path::to_path_buf)
            .or_else(|| config.contract_path(&target.project)),
        entrypoint: target
            .entrypoint
            .clone()
            .or(config.entrypoint)
            .unwrap_or_default(),
        timeout,
        grace,
        go_binary: target
            .go_binary
            .clone()
            .or(config.go_binary)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_GO_BINARY)),
    })
}

fn emit(text: &str, output: Option<&Path>) -> Result<(), String> {
    match output {
        Some(path) => fs::write(path, text)
            .map_err(|e| format!("failed to write '{}': {e}", path.display())),
        None => {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}

fn run_validate(args: ValidateArgs) -> Result<bool, String> {
    let settings = resolve_settings(&args.target, args.contract.as_deref())?;
    let Some(contract) = settings.contract.clone() else {
        return Err(format!(
            "no contract given: pass --contract or set `contract` in {PROJECT_CONFIG_FILE}"
        ));
    };

    let inspector = settings.inspector();
    let report = orchestrate(
        &inspector,
        &ContractCheck {
            project: settings.project.clone(),
            contract,
            entrypoint: settings.entrypoint.clone(),
            timeout: settings.timeout,
        },
    )
    .map_err(|e| e.to_string())?;

    let rendered = format_report(&report, args.format)?;
    emit(&rendered, args.output.as_deref())?;
    Ok(report.success)
}

fn run_inspect(args: InspectArgs) -> Result<(), String> {
    let settings = resolve_settings(&args.target, None)?;
    let tree = settings
        .inspector()
        .inspect(&settings.project, &settings.entrypoint)
        .map_err(|e| e.to_string())?;

    let rendered = format_tree(&tree, args.format.into())?;
    emit(&rendered, args.output.as_deref())?;
    if let Some(path) = &args.output {
        eprintln!(
            "Wrote {} ({} commands) to {}",
            tree.name,
            tree.node_count(),
            path.display()
        );
    }
    Ok(())
}

fn run_check_contract(args: CheckContractArgs) -> Result<bool, String> {
    let mut all_valid = true;
    for input in &args.inputs {
        match load_contract(input) {
            Ok(contract) => println!("ok: {} ({})", input.display(), summarize(&contract)),
            Err(err) => {
                all_valid = false;
                println!("invalid: {err}");
            }
        }
    }
    Ok(all_valid)
}

fn summarize(contract: &CommandNode) -> String {
    fn count_flags(node: &CommandNode) -> usize {
        node.flags.len() + node.children.iter().map(count_flags).sum::<usize>()
    }
    format!(
        "root '{}', {} commands, {} flags",
        contract.name,
        contract.node_count(),
        count_flags(contract)
    )
}
