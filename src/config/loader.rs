use super::{Backend, BootstrapConfig};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_DIR_NAME: &str = "uiforge";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Flags that override every other configuration layer
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigOverrides {
    /// Cluster backend to provision
    #[arg(long, short = 'b', value_enum, global = true)]
    pub backend: Option<Backend>,
    /// Cluster (Minikube profile) name
    #[arg(long, global = true)]
    pub cluster_name: Option<String>,
    /// Memory for the Minikube VM/container in MiB
    #[arg(long, global = true)]
    pub memory_mb: Option<u32>,
    /// CPUs for the Minikube VM/container
    #[arg(long, global = true)]
    pub cpus: Option<u32>,
    /// Minikube driver (docker, kvm2, hyperkit, ...)
    #[arg(long, global = true)]
    pub driver: Option<String>,
    /// Kubernetes version (k3s expects a release tag such as v1.28.3+k3s1)
    #[arg(long, global = true)]
    pub kubernetes_version: Option<String>,
    /// Namespace created for workloads
    #[arg(long, short = 'n', global = true)]
    pub namespace: Option<String>,
    /// Seconds to wait for nodes to report Ready
    #[arg(long, global = true)]
    pub ready_timeout_secs: Option<u64>,
    /// Seconds to wait for each add-on to report ready pods
    #[arg(long, global = true)]
    pub addon_timeout_secs: Option<u64>,
    /// Bind the invoking user to cluster-admin (k3s only)
    #[arg(long, global = true, overrides_with = "no_grant_cluster_admin")]
    pub grant_cluster_admin: bool,
    /// Skip the cluster-admin binding even if the config file enables it
    #[arg(long, global = true, overrides_with = "grant_cluster_admin")]
    pub no_grant_cluster_admin: bool,
    /// User that should own the kubeconfig (defaults to $SUDO_USER)
    #[arg(long, global = true)]
    pub user: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut BootstrapConfig) {
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(ref name) = self.cluster_name {
            config.cluster_name = name.clone();
        }
        if let Some(memory) = self.memory_mb {
            config.memory_mb = memory;
        }
        if let Some(cpus) = self.cpus {
            config.cpus = cpus;
        }
        if let Some(ref driver) = self.driver {
            config.driver = driver.clone();
        }
        if let Some(ref version) = self.kubernetes_version {
            config.kubernetes_version = version.clone();
        }
        if let Some(ref namespace) = self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(timeout) = self.ready_timeout_secs {
            config.ready_timeout_secs = timeout;
        }
        if let Some(timeout) = self.addon_timeout_secs {
            config.addon_timeout_secs = timeout;
        }
        if self.grant_cluster_admin {
            config.grant_cluster_admin = true;
        } else if self.no_grant_cluster_admin {
            config.grant_cluster_admin = false;
        }
        if let Some(ref user) = self.user {
            config.invoking_user = Some(user.clone());
        }
    }
}

/// Where to find the configuration layers for one run
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit TOML file; must exist when given
    pub config_file: Option<PathBuf>,
    /// Explicit .env file; must exist when given
    pub env_file: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

/// `~/.config/uiforge/config.toml`, if a home directory is known
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

pub fn load_file(path: &Path) -> Result<BootstrapConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: BootstrapConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Apply `UIFORGE_*` variables through `lookup`.
///
/// `SUDO_USER` fills the invoking user only when no layer has set one.
pub fn apply_env<F>(config: &mut BootstrapConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("UIFORGE_BACKEND") {
        config.backend = v.parse::<Backend>().context("Invalid UIFORGE_BACKEND")?;
    }
    if let Some(v) = get("UIFORGE_CLUSTER_NAME") {
        config.cluster_name = v;
    }
    if let Some(v) = get("UIFORGE_MEMORY_MB") {
        config.memory_mb = parse_number(&v, "UIFORGE_MEMORY_MB")?;
    }
    if let Some(v) = get("UIFORGE_CPUS") {
        config.cpus = parse_number(&v, "UIFORGE_CPUS")?;
    }
    if let Some(v) = get("UIFORGE_DRIVER") {
        config.driver = v;
    }
    if let Some(v) = get("UIFORGE_KUBERNETES_VERSION") {
        config.kubernetes_version = v;
    }
    if let Some(v) = get("UIFORGE_NAMESPACE") {
        config.namespace = v;
    }
    if let Some(v) = get("UIFORGE_READY_TIMEOUT_SECS") {
        config.ready_timeout_secs = parse_number(&v, "UIFORGE_READY_TIMEOUT_SECS")?;
    }
    if let Some(v) = get("UIFORGE_ADDON_TIMEOUT_SECS") {
        config.addon_timeout_secs = parse_number(&v, "UIFORGE_ADDON_TIMEOUT_SECS")?;
    }
    if let Some(v) = get("UIFORGE_POLL_INTERVAL_SECS") {
        config.poll_interval_secs = parse_number(&v, "UIFORGE_POLL_INTERVAL_SECS")?;
    }
    if let Some(v) = get("UIFORGE_GRANT_CLUSTER_ADMIN") {
        config.grant_cluster_admin = parse_bool(&v)
            .with_context(|| format!("Invalid UIFORGE_GRANT_CLUSTER_ADMIN: {}", v))?;
    }
    if let Some(v) = get("UIFORGE_INSTALLER_SHA256") {
        config.installer_sha256 = Some(v.trim().to_lowercase());
    }
    if let Some(v) = get("UIFORGE_USER") {
        config.invoking_user = Some(v);
    } else if config.invoking_user.is_none() {
        config.invoking_user = get("SUDO_USER");
    }
    Ok(())
}

/// Build the run configuration from all layers and validate it
pub fn load(options: &LoadOptions) -> Result<BootstrapConfig> {
    match options.env_file {
        Some(ref path) => {
            dotenv::from_path(path)
                .with_context(|| format!("Failed to load env file: {}", path.display()))?;
        }
        None => {
            // A missing .env in the working directory is normal
            let _ = dotenv::dotenv();
        }
    }

    let file = match options.config_file {
        Some(ref path) => Some(path.clone()),
        None => default_config_path().filter(|p| p.exists()),
    };

    let mut config = match file {
        Some(path) => {
            debug!(path = %path.display(), "loading config file");
            load_file(&path)?
        }
        None => BootstrapConfig::default(),
    };

    apply_env(&mut config, |key| std::env::var(key).ok())?;
    options.overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    debug!(?config, "resolved configuration");
    Ok(config)
}

fn parse_number<T>(value: &str, key: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {}: {}", key, value))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
