//! Cluster lifecycle commands

use crate::bootstrap::{Bootstrapper, Outcome};
use crate::config::{Backend, BootstrapConfig};
use crate::error::BootstrapError;
use crate::services::{ClusterState, provisioner_for};
use crate::summary;
use crate::utils::{CommandExecutor, HttpSource, LocalExecutor, ManifestSource};
use anyhow::Result;
use std::io::{self, Write};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

pub fn handle_up(config: &BootstrapConfig) -> Result<()> {
    println!("{}", RULE);
    println!(
        "Bootstrap {} cluster '{}'",
        config.backend, config.cluster_name
    );
    println!("{}", RULE);
    println!();

    let exec = LocalExecutor;
    let source = HttpSource::new()?;
    let mut bootstrapper = Bootstrapper::new(&exec, &source, config);

    match bootstrapper.run()? {
        Outcome::AlreadyReady => summary::print_already_ready(config),
        Outcome::Provisioned(report) => summary::print_summary(&report, config),
    }
    Ok(())
}

/// Tool check, then state detection. Installs nothing and needs no root.
pub fn cluster_status(
    config: &BootstrapConfig,
    exec: &dyn CommandExecutor,
    source: &dyn ManifestSource,
) -> Result<(Backend, ClusterState), BootstrapError> {
    let provisioner = provisioner_for(config, exec, source);
    provisioner.check_tools()?;
    Ok((provisioner.backend(), provisioner.detect_existing_cluster()))
}

pub fn handle_status(config: &BootstrapConfig) -> Result<()> {
    let exec = LocalExecutor;
    let source = HttpSource::new()?;

    let (backend, state) = cluster_status(config, &exec, &source)?;
    println!("Backend:  {}", backend);
    println!("Cluster:  {}", config.cluster_name);
    println!("State:    {}", state);
    Ok(())
}

/// Remove the cluster with the backend's own uninstall path
pub fn teardown_cluster(
    config: &BootstrapConfig,
    exec: &dyn CommandExecutor,
    source: &dyn ManifestSource,
) -> Result<(), BootstrapError> {
    provisioner_for(config, exec, source).teardown()
}

pub fn handle_down(config: &BootstrapConfig, yes: bool) -> Result<()> {
    if !yes {
        print!(
            "This will delete the {} cluster '{}' and all of its workloads. Continue? [y/N]: ",
            config.backend, config.cluster_name
        );
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let exec = LocalExecutor;
    let source = HttpSource::new()?;
    teardown_cluster(config, &exec, &source)?;
    Ok(())
}
