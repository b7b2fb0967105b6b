//! Engine Forge - custom Godot build provisioning CLI
//!
//! The `engine-forge` command prepares a workspace for building a custom
//! Godot 3.x editor with C#, the embedded Python bridge and Uiverse modules.
//!
//! ## Commands
//!
//! - `setup`: validate the toolchain, provision the upstream tree, integrate
//!   modules and prepare the build environment (default)
//! - `check`: toolchain validation only
//! - `hints`: print the SCons build commands and feature switches
//! - `config`: render the default `custom.py`

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use forge_core::{
    render_next_steps, BuildConfig, DirtyTreePolicy, ForgeConfig, Orchestrator, PipelineError,
};
use forge_host::{CommandRunner, SystemRunner};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "engine-forge")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Provision a custom Godot engine build", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Workspace root (default: FORGE_WORKSPACE or the current directory)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Upstream repository URL
    #[arg(long, global = true)]
    upstream_url: Option<String>,

    /// Branch or tag the upstream tree is pinned to
    #[arg(long, global = true)]
    upstream_ref: Option<String>,

    /// Python interpreter used for pip operations
    #[arg(long, global = true)]
    python: Option<String>,

    /// Handling of local changes in an existing upstream tree: warn, refuse or ignore
    #[arg(long, global = true)]
    dirty_tree: Option<DirtyTreePolicy>,

    /// Write a JSON run report to this path
    #[arg(long, global = true, env = "FORGE_REPORT")]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the full provisioning pipeline (default)
    Setup,

    /// Check the toolchain, installing missing Python packages
    Check,

    /// Print build commands and feature switches
    Hints,

    /// Render the default build configuration file
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    forge_core::init_tracing(cli.json, level);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new());

    match cli.command.unwrap_or(Commands::Setup) {
        Commands::Setup => Ok(cmd_setup(config, runner)),
        Commands::Check => Ok(cmd_check(config, runner)),
        Commands::Hints => {
            cmd_hints(&config);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { output, force } => {
            cmd_config(output.as_deref(), force)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Defaults, then `FORGE_*` variables, then command-line flags.
fn load_config(cli: &Cli) -> Result<ForgeConfig> {
    let mut config = ForgeConfig::from_env().context("Invalid FORGE_* configuration")?;

    if let Some(workspace) = &cli.workspace {
        config.workspace = workspace.clone();
    }
    if let Some(url) = &cli.upstream_url {
        config.upstream.url = url.clone();
    }
    if let Some(pinned) = &cli.upstream_ref {
        config.upstream.pinned_ref = pinned.clone();
    }
    if let Some(python) = &cli.python {
        config.python = Some(python.clone());
    }
    if let Some(policy) = cli.dirty_tree {
        config.dirty_tree = policy;
    }
    if let Some(report) = &cli.report {
        config.report_path = Some(report.clone());
    }

    if !config.workspace.is_dir() {
        bail!(
            "Workspace {} does not exist or is not a directory",
            config.workspace.display()
        );
    }
    Ok(config)
}

fn cmd_setup(config: ForgeConfig, runner: Arc<dyn CommandRunner>) -> ExitCode {
    info!(
        workspace = ?config.workspace,
        upstream = %config.upstream.url,
        pinned_ref = %config.upstream.pinned_ref,
        "Starting custom Godot build setup"
    );
    Orchestrator::new(config, runner).run()
}

fn cmd_check(config: ForgeConfig, runner: Arc<dyn CommandRunner>) -> ExitCode {
    let validator = Orchestrator::new(config, runner).validator();

    match validator.validate() {
        Ok(report) => {
            println!("Toolchain OK");
            if let (Some(python), Some(version)) = (&report.python, &report.python_version) {
                println!("  python:   {} ({})", python, version);
            }
            if let Some(version) = &report.managed_runtime_version {
                println!("  mono:     {}", version);
            }
            if !report.installed_packages.is_empty() {
                println!("  installed: {}", report.installed_packages.join(", "));
            }
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&PipelineError::from(e)),
    }
}

fn cmd_hints(config: &ForgeConfig) {
    print!("{}", render_next_steps(&BuildConfig::default(), config.platform));
}

fn cmd_config(output: Option<&Path>, force: bool) -> Result<()> {
    let rendered = BuildConfig::default().render_custom_py();

    match output {
        None => print!("{}", rendered),
        Some(path) => {
            if path.exists() && !force {
                bail!(
                    "{} already exists; pass --force to overwrite it",
                    path.display()
                );
            }
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn report_failure(err: &PipelineError) -> ExitCode {
    eprintln!("error: {}", err);
    if let Some(remediation) = err.remediation() {
        eprintln!();
        eprintln!("{}", remediation);
    }
    err.exit_code()
}
