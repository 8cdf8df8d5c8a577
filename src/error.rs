//! Error types for the cluster bootstrapper
//!
//! Every variant is terminal for a run. Internal plumbing (process spawning,
//! file I/O, HTTP) uses `anyhow` and is folded into one of these kinds at the
//! operation boundary so the operator sees a single category plus a
//! remediation command.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::config::{Backend, BootstrapConfig};

/// Category of a bootstrap failure, used for state tracking and exit reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ToolMissing,
    PrivilegeRequired,
    Install,
    Timeout,
    AddonTimeout,
    Apply,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ToolMissing => "ToolMissing",
            ErrorKind::PrivilegeRequired => "PrivilegeRequired",
            ErrorKind::Install => "InstallError",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::AddonTimeout => "AddonTimeout",
            ErrorKind::Apply => "ApplyError",
            ErrorKind::Config => "ConfigError",
        };
        f.write_str(name)
    }
}

/// Main error type for bootstrap operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    /// A required binary is not on PATH
    #[error("required tool not found: {tool}")]
    ToolMissing {
        /// The tool that was not found
        tool: String,
        /// How to install it manually
        hint: String,
    },

    /// The backend needs root and the process is not running as root
    #[error("{backend} bootstrap requires root privileges")]
    PrivilegeRequired { backend: Backend },

    /// Installer download, installer run or service start failed
    #[error("installation failed: {0}")]
    Install(String),

    /// Node readiness was not observed in time
    #[error("{what} not ready after {}", human_duration(.timeout))]
    Timeout { what: String, timeout: Duration },

    /// An add-on's pods did not become ready in time
    #[error("addon {addon} not ready after {}", human_duration(.timeout))]
    AddonTimeout { addon: String, timeout: Duration },

    /// A manifest could not be fetched or applied
    #[error("apply failed: {0}")]
    Apply(String),

    /// Access configuration (kubeconfig, context) failed
    #[error("configuration failed: {0}")]
    Config(String),
}

impl BootstrapError {
    pub fn tool_missing(tool: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::ToolMissing {
            tool: tool.into(),
            hint: hint.into(),
        }
    }

    pub fn install(msg: impl Into<String>) -> Self {
        Self::Install(msg.into())
    }

    pub fn apply(msg: impl Into<String>) -> Self {
        Self::Apply(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The failure category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BootstrapError::ToolMissing { .. } => ErrorKind::ToolMissing,
            BootstrapError::PrivilegeRequired { .. } => ErrorKind::PrivilegeRequired,
            BootstrapError::Install(_) => ErrorKind::Install,
            BootstrapError::Timeout { .. } => ErrorKind::Timeout,
            BootstrapError::AddonTimeout { .. } => ErrorKind::AddonTimeout,
            BootstrapError::Apply(_) => ErrorKind::Apply,
            BootstrapError::Config(_) => ErrorKind::Config,
        }
    }

    /// Suggested operator command for recovering from this failure.
    ///
    /// Nothing is rolled back automatically, so most remediations are
    /// "tear the partial cluster down and run again".
    pub fn remediation(&self, config: &BootstrapConfig) -> String {
        let teardown = teardown_command(config);
        match self {
            BootstrapError::ToolMissing { hint, .. } => hint.clone(),
            BootstrapError::PrivilegeRequired { .. } => {
                "Re-run with sudo: sudo -E uiforge-cluster up --backend k3s".to_string()
            }
            BootstrapError::Install(_) => {
                format!("Clean up the partial install and re-run:\n  {}\n  uiforge-cluster up", teardown)
            }
            BootstrapError::Timeout { .. } => match config.backend {
                Backend::K3s => format!(
                    "Inspect the service with 'journalctl -u k3s -e', or reset with:\n  {}",
                    teardown
                ),
                Backend::Minikube => format!(
                    "Inspect with 'minikube logs -p {}', or reset with:\n  {}",
                    config.cluster_name, teardown
                ),
            },
            BootstrapError::AddonTimeout { .. } => format!(
                "Check pod status with 'kubectl get pods -A', raise --addon-timeout-secs, or reset with:\n  {}",
                teardown
            ),
            BootstrapError::Apply(_) => format!(
                "Check network access to the manifest URLs and cluster health, then re-run, or reset with:\n  {}",
                teardown
            ),
            BootstrapError::Config(_) => format!(
                "Fix the kubeconfig permissions or user settings and re-run, or reset with:\n  {}",
                teardown
            ),
        }
    }
}

/// `120s`, `1.5s` or `200ms`
fn human_duration(duration: &Duration) -> String {
    if duration.subsec_millis() == 0 && duration.as_secs() > 0 {
        format!("{}s", duration.as_secs())
    } else if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

/// The backend's own teardown command for the configured cluster
pub fn teardown_command(config: &BootstrapConfig) -> String {
    match config.backend {
        Backend::K3s => "sudo /usr/local/bin/k3s-uninstall.sh".to_string(),
        Backend::Minikube => format!("minikube delete -p {}", config.cluster_name),
    }
}
