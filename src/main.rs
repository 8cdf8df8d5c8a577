use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uiforge_cluster::BootstrapError;
use uiforge_cluster::commands::{self, Commands};
use uiforge_cluster::config::{self, ConfigOverrides, LoadOptions};

#[derive(Parser)]
#[command(name = "uiforge-cluster", version)]
#[command(about = "Provision a local Kubernetes development cluster (k3s or Minikube) with ingress and metrics add-ons", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// TOML config file (default: ~/.config/uiforge/config.toml if present)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// .env file to load before reading UIFORGE_* variables (default: ./.env if present)
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = LoadOptions {
        config_file: cli.config,
        env_file: cli.env_file,
        overrides: cli.overrides,
    };
    let config = match config::load(&options) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match commands::handle_command(cli.command.unwrap_or(Commands::Up), &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<BootstrapError>() {
                Some(err) => {
                    eprintln!();
                    eprintln!("✗ {} [{}]", err, err.kind());
                    match err {
                        BootstrapError::ToolMissing { .. }
                        | BootstrapError::PrivilegeRequired { .. } => {}
                        _ => eprintln!("  No changes were rolled back."),
                    }
                    eprintln!();
                    eprintln!("{}", err.remediation(&config));
                }
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}
