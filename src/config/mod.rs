//! Bootstrap configuration
//!
//! One immutable `BootstrapConfig` is built per run (defaults, then the TOML
//! file, then `UIFORGE_*` environment, then CLI flags) and handed to the
//! bootstrapper. Nothing downstream reads the process environment.

mod loader;

pub use loader::{ConfigOverrides, LoadOptions, apply_env, default_config_path, load, load_file};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;

pub const DEFAULT_CLUSTER_NAME: &str = "uiforge-local";
pub const DEFAULT_NAMESPACE: &str = "uiforge";
pub const DEFAULT_INGRESS_MANIFEST_URL: &str = "https://raw.githubusercontent.com/kubernetes/ingress-nginx/controller-v1.8.2/deploy/static/provider/baremetal/deploy.yaml";
pub const DEFAULT_METRICS_SERVER_MANIFEST_URL: &str =
    "https://github.com/kubernetes-sigs/metrics-server/releases/latest/download/components.yaml";

/// Cluster backend to provision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    K3s,
    Minikube,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::K3s => f.write_str("k3s"),
            Backend::Minikube => f.write_str("minikube"),
        }
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "k3s" => Ok(Backend::K3s),
            "minikube" => Ok(Backend::Minikube),
            other => bail!("Unknown backend '{}' (expected 'k3s' or 'minikube')", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub backend: Backend,
    pub cluster_name: String,
    pub memory_mb: u32,
    pub cpus: u32,
    pub driver: String,
    pub kubernetes_version: String,
    pub namespace: String,
    pub ready_timeout_secs: u64,
    pub addon_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Bind the invoking user to cluster-admin (k3s only)
    pub grant_cluster_admin: bool,
    /// Non-root user that should own the kubeconfig
    pub invoking_user: Option<String>,
    pub installer_sha256: Option<String>,
    pub ingress_manifest_url: String,
    pub ingress_sha256: Option<String>,
    pub metrics_server_manifest_url: String,
    pub metrics_server_sha256: Option<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Minikube,
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            memory_mb: 8192,
            cpus: 4,
            driver: "docker".to_string(),
            kubernetes_version: "v1.28.3".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            ready_timeout_secs: 120,
            addon_timeout_secs: 300,
            poll_interval_secs: 2,
            grant_cluster_admin: false,
            invoking_user: None,
            installer_sha256: None,
            ingress_manifest_url: DEFAULT_INGRESS_MANIFEST_URL.to_string(),
            ingress_sha256: None,
            metrics_server_manifest_url: DEFAULT_METRICS_SERVER_MANIFEST_URL.to_string(),
            metrics_server_sha256: None,
        }
    }
}

impl BootstrapConfig {
    /// Reject values the backends would fail on later, after side effects
    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.trim().is_empty() {
            bail!("cluster_name cannot be empty");
        }
        if !is_dns_label(&self.namespace) {
            bail!(
                "namespace '{}' is not a valid DNS-1123 label (lowercase alphanumerics and '-', max 63 chars)",
                self.namespace
            );
        }
        if self.cpus == 0 {
            bail!("cpus must be at least 1");
        }
        if self.memory_mb < 1024 {
            bail!("memory_mb must be at least 1024 (got {})", self.memory_mb);
        }
        if self.driver.trim().is_empty() {
            bail!("driver cannot be empty");
        }
        if self.ready_timeout_secs == 0 || self.addon_timeout_secs == 0 {
            bail!("timeouts must be greater than zero");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        if self.poll_interval_secs > self.ready_timeout_secs.min(self.addon_timeout_secs) {
            bail!("poll_interval_secs cannot exceed the readiness timeouts");
        }
        for (field, pin) in [
            ("installer_sha256", &self.installer_sha256),
            ("ingress_sha256", &self.ingress_sha256),
            ("metrics_server_sha256", &self.metrics_server_sha256),
        ] {
            if let Some(pin) = pin {
                if pin.len() != 64 || !pin.chars().all(|c| c.is_ascii_hexdigit()) {
                    bail!("{} must be 64 hex characters", field);
                }
            }
        }
        Ok(())
    }

    /// User that owns the kubeconfig and receives the optional admin binding
    pub fn user(&self) -> String {
        self.invoking_user
            .clone()
            .unwrap_or_else(whoami::username)
    }

    /// The k3s installer only understands k3s release tags (e.g. v1.28.3+k3s1)
    pub fn k3s_version(&self) -> Option<&str> {
        let version = self.kubernetes_version.trim();
        version.contains("+k3s").then_some(version)
    }
}

/// Poll and timeout settings derived from the config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub poll_interval: Duration,
    pub ready_timeout: Duration,
    pub addon_timeout: Duration,
}

impl From<&BootstrapConfig> for Timings {
    fn from(config: &BootstrapConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
            addon_timeout: Duration::from_secs(config.addon_timeout_secs),
        }
    }
}

fn is_dns_label(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}
