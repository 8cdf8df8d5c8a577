// Command module routing
//
// To add a new command:
// 1. Add the handler to `cluster.rs` (or a new file in this directory)
// 2. Add the variant to `Commands`
// 3. Add the match arm in `handle_command`

pub mod cluster;

use crate::config::BootstrapConfig;
use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Provision the cluster and add-ons (default)
    Up,
    /// Show the detected cluster state without changing anything
    Status,
    /// Remove the cluster with the backend's own uninstall command
    Down {
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

/// Dispatch command to its handler
pub fn handle_command(command: Commands, config: &BootstrapConfig) -> Result<()> {
    match command {
        Commands::Up => cluster::handle_up(config)?,
        Commands::Status => cluster::handle_status(config)?,
        Commands::Down { yes } => cluster::handle_down(config, yes)?,
    }
    Ok(())
}
