//! Cluster backends
//!
//! Each backend implements [`Provisioner`]; the bootstrapper drives whichever
//! one the configuration selects through the same step sequence.

pub mod addons;
mod k3s;
pub mod kubectl;
mod minikube;

pub use addons::{Addon, AddonSource};
pub use k3s::{K3S_INSTALL_URL, K3S_KUBECONFIG, K3S_UNINSTALL_SCRIPT, K3s, validate_kubeconfig};
pub use kubectl::Kubectl;
pub use minikube::{Minikube, MinikubeStatus, parse_minikube_status};

use crate::config::{Backend, BootstrapConfig, Timings};
use crate::error::BootstrapError;
use crate::utils::{CommandExecutor, ManifestSource, fetch_verified};
use std::fmt;
use std::path::PathBuf;

/// Externally observed cluster state; never cached beyond one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    Unknown,
    Stopped,
    Installing,
    Starting,
    Ready,
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClusterState::Unknown => "unknown",
            ClusterState::Stopped => "stopped",
            ClusterState::Installing => "installing",
            ClusterState::Starting => "starting",
            ClusterState::Ready => "ready",
        };
        f.write_str(s)
    }
}

/// How to reach the cluster once access is configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessInfo {
    pub context: String,
    /// Kubeconfig holding `context`; `None` when the user's home is unknown
    /// and kubectl falls back to its own default lookup
    pub kubeconfig: Option<PathBuf>,
}

/// One cluster backend
pub trait Provisioner {
    fn backend(&self) -> Backend;

    /// Required binaries only; safe to run unprivileged
    fn check_tools(&self) -> Result<(), BootstrapError>;

    /// Preflight: required binaries and privilege
    fn ensure_tool_installed(&self) -> Result<(), BootstrapError>;

    /// Ask the backend what state the cluster is in
    fn detect_existing_cluster(&self) -> ClusterState;

    /// Install the backend if absent, otherwise start what is there
    fn install_or_start(&self, state: ClusterState) -> Result<(), BootstrapError>;

    /// Block until the control plane reports a ready node
    fn wait_for_ready(&self, timings: &Timings) -> Result<(), BootstrapError>;

    /// Make the cluster usable from the invoking user's kubectl
    fn configure_access(&self) -> Result<AccessInfo, BootstrapError>;

    fn kubectl(&self) -> Kubectl<'_>;

    fn addons(&self) -> Vec<Addon>;

    /// Put an add-on's resources on the cluster (readiness is waited on separately)
    fn deploy_addon(&self, addon: &Addon) -> Result<(), BootstrapError>;

    /// Remove the cluster with the backend's own uninstall path
    fn teardown(&self) -> Result<(), BootstrapError>;
}

/// Build the provisioner selected by `config.backend`
pub fn provisioner_for<'a>(
    config: &'a BootstrapConfig,
    exec: &'a dyn CommandExecutor,
    source: &'a dyn ManifestSource,
) -> Box<dyn Provisioner + 'a> {
    match config.backend {
        Backend::K3s => Box::new(K3s::new(exec, source, config)),
        Backend::Minikube => Box::new(Minikube::new(exec, source, config)),
    }
}

/// Fetch a pinned remote manifest and apply it
fn apply_remote_manifest(
    source: &dyn ManifestSource,
    kubectl: &Kubectl<'_>,
    addon: &str,
    url: &str,
    sha256: Option<&str>,
) -> Result<(), BootstrapError> {
    let manifest = fetch_verified(source, url, sha256).map_err(|e| {
        BootstrapError::apply(format!("failed to fetch {} manifest: {:#}", addon, e))
    })?;
    kubectl
        .apply(&manifest)
        .map_err(|e| BootstrapError::apply(format!("failed to apply {} manifest: {:#}", addon, e)))?;
    Ok(())
}
