//! k3s backend: single-node server installed with the upstream script

use super::addons::{self, Addon, AddonSource};
use super::kubectl::{Kubectl, PROBE_REQUEST_TIMEOUT, any_ready};
use super::{AccessInfo, ClusterState, Provisioner, apply_remote_manifest};
use crate::config::{Backend, BootstrapConfig, Timings};
use crate::error::BootstrapError;
use crate::utils::{
    CommandExecutor, ManifestSource, failure_message, fetch_verified, poll_until, stdout_string,
};
use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::{debug, info};
use yaml_rust::YamlLoader;

pub const K3S_INSTALL_URL: &str = "https://get.k3s.io";
pub const K3S_KUBECONFIG: &str = "/etc/rancher/k3s/k3s.yaml";
pub const K3S_UNINSTALL_SCRIPT: &str = "/usr/local/bin/k3s-uninstall.sh";
const K3S_SERVICE_UNIT: &str = "/etc/systemd/system/k3s.service";

/// Flags passed to the install script. Traefik is disabled because
/// ingress-nginx is installed as the ingress controller.
const INSTALL_FLAGS: [&str; 4] = ["--write-kubeconfig-mode", "644", "--disable", "traefik"];

pub struct K3s<'a> {
    exec: &'a dyn CommandExecutor,
    source: &'a dyn ManifestSource,
    config: &'a BootstrapConfig,
}

impl<'a> K3s<'a> {
    pub fn new(
        exec: &'a dyn CommandExecutor,
        source: &'a dyn ManifestSource,
        config: &'a BootstrapConfig,
    ) -> Self {
        Self {
            exec,
            source,
            config,
        }
    }

    /// `systemctl is-active k3s`; the only status read by pattern, since
    /// systemctl has no structured form for it
    fn service_state(&self) -> String {
        self.exec
            .execute_simple("systemctl", &["is-active", "k3s"])
            .map(|o| stdout_string(&o))
            .unwrap_or_else(|_| "unknown".to_string())
    }

    fn systemctl(&self, action: &str) -> Result<(), BootstrapError> {
        let output = self
            .exec
            .execute_simple("systemctl", &[action, "k3s"])
            .map_err(|e| BootstrapError::install(format!("{:#}", e)))?;
        if !output.status.success() {
            return Err(BootstrapError::install(format!(
                "systemctl {} k3s failed: {}",
                action,
                failure_message(&output)
            )));
        }
        Ok(())
    }

    fn run_installer(&self) -> Result<(), BootstrapError> {
        println!("Downloading k3s install script...");
        let script = fetch_verified(
            self.source,
            K3S_INSTALL_URL,
            self.config.installer_sha256.as_deref(),
        )
        .map_err(|e| BootstrapError::install(format!("{:#}", e)))?;

        let mut env = Vec::new();
        if let Some(version) = self.config.k3s_version() {
            env.push(("INSTALL_K3S_VERSION", version));
        }

        let mut args = vec!["-s", "-"];
        args.extend(INSTALL_FLAGS);

        println!("Running k3s installer...");
        let output = self
            .exec
            .execute_with_input("sh", &args, &env, script.as_bytes())
            .map_err(|e| BootstrapError::install(format!("{:#}", e)))?;
        debug!(stdout = %String::from_utf8_lossy(&output.stdout), "k3s installer output");

        if !output.status.success() {
            return Err(BootstrapError::install(format!(
                "k3s install script failed: {}",
                failure_message(&output)
            )));
        }
        println!("✓ k3s installed");
        Ok(())
    }
}

impl Provisioner for K3s<'_> {
    fn backend(&self) -> Backend {
        Backend::K3s
    }

    fn check_tools(&self) -> Result<(), BootstrapError> {
        if !self.exec.check_command_exists("systemctl") {
            return Err(BootstrapError::tool_missing(
                "systemctl",
                "k3s is installed as a systemd service; run on a systemd-based Linux host",
            ));
        }
        Ok(())
    }

    fn ensure_tool_installed(&self) -> Result<(), BootstrapError> {
        // Checked first so nothing below runs unprivileged
        if !self.exec.is_privileged() {
            return Err(BootstrapError::PrivilegeRequired {
                backend: Backend::K3s,
            });
        }

        self.check_tools()?;

        if self.exec.check_command_exists("k3s") {
            println!("✓ k3s binary found");
        } else {
            println!("k3s not found, it will be installed");
        }
        Ok(())
    }

    fn detect_existing_cluster(&self) -> ClusterState {
        if !self.exec.check_command_exists("k3s") {
            return ClusterState::Unknown;
        }

        match self.service_state().as_str() {
            "active" => match self.kubectl().nodes(PROBE_REQUEST_TIMEOUT) {
                Ok(nodes) if any_ready(&nodes) => ClusterState::Ready,
                Ok(_) => ClusterState::Starting,
                Err(e) => {
                    debug!(error = %e, "k3s active but node query failed");
                    ClusterState::Starting
                }
            },
            "activating" | "reloading" => ClusterState::Starting,
            _ if !self.exec.file_exists(Path::new(K3S_SERVICE_UNIT)) => ClusterState::Installing,
            _ => ClusterState::Stopped,
        }
    }

    fn install_or_start(&self, state: ClusterState) -> Result<(), BootstrapError> {
        if self.exec.check_command_exists("k3s") {
            println!("k3s already installed ({}), starting service...", state);
        } else {
            self.run_installer()?;
        }

        self.systemctl("enable")?;
        self.systemctl("start")?;
        println!("✓ k3s service enabled and started");
        Ok(())
    }

    fn wait_for_ready(&self, timings: &Timings) -> Result<(), BootstrapError> {
        println!(
            "Waiting for k3s node to become Ready (timeout {}s)...",
            timings.ready_timeout.as_secs()
        );
        let kubectl = self.kubectl();
        poll_until(
            "k3s node",
            timings.poll_interval,
            timings.ready_timeout,
            |remaining| Ok(any_ready(&kubectl.nodes(remaining)?).then_some(())),
        )
        .map_err(|t| {
            debug!(
                attempts = t.attempts,
                elapsed_ms = t.elapsed.as_millis(),
                last_error = ?t.last_error,
                "node readiness timed out"
            );
            BootstrapError::Timeout {
                what: "k3s node".to_string(),
                timeout: timings.ready_timeout,
            }
        })?;
        println!("✓ k3s node is Ready");
        Ok(())
    }

    fn configure_access(&self) -> Result<AccessInfo, BootstrapError> {
        let username = self.config.user();
        let user = self
            .exec
            .lookup_user(&username)
            .map_err(|e| BootstrapError::config(format!("{:#}", e)))?
            .ok_or_else(|| BootstrapError::config(format!("user '{}' does not exist", username)))?;

        let content = self
            .exec
            .read_file(Path::new(K3S_KUBECONFIG))
            .map_err(|e| BootstrapError::config(format!("{:#}", e)))?;
        let context = validate_kubeconfig(&content)
            .map_err(|e| BootstrapError::config(format!("{}: {:#}", K3S_KUBECONFIG, e)))?;

        let kube_dir = user.home.join(".kube");
        let target = kube_dir.join("config");

        let copy = || -> Result<()> {
            self.exec.mkdir_p(&kube_dir)?;
            self.exec.write_file(&target, content.as_bytes())?;
            // Installed as root, used as the invoking user
            self.exec.chown(&kube_dir, user.uid, user.gid)?;
            self.exec.chown(&target, user.uid, user.gid)?;
            Ok(())
        };
        copy().map_err(|e| BootstrapError::config(format!("{:#}", e)))?;

        info!(path = %target.display(), user = %user.name, "kubeconfig installed");
        println!("✓ Kubeconfig copied to {} (owner {})", target.display(), user.name);

        Ok(AccessInfo {
            context,
            kubeconfig: Some(target),
        })
    }

    fn kubectl(&self) -> Kubectl<'_> {
        Kubectl::k3s(self.exec)
    }

    fn addons(&self) -> Vec<Addon> {
        addons::k3s_addons(self.config)
    }

    fn deploy_addon(&self, addon: &Addon) -> Result<(), BootstrapError> {
        match &addon.source {
            AddonSource::Manifest { url, sha256 } => apply_remote_manifest(
                self.source,
                &self.kubectl(),
                addon.name,
                url,
                sha256.as_deref(),
            ),
            AddonSource::Native(name) => Err(BootstrapError::apply(format!(
                "k3s has no native addon '{}'",
                name
            ))),
        }
    }

    fn teardown(&self) -> Result<(), BootstrapError> {
        if !self.exec.is_privileged() {
            return Err(BootstrapError::PrivilegeRequired {
                backend: Backend::K3s,
            });
        }
        if !self.exec.file_exists(Path::new(K3S_UNINSTALL_SCRIPT)) {
            return Err(BootstrapError::tool_missing(
                K3S_UNINSTALL_SCRIPT,
                "k3s does not appear to be installed; nothing to remove",
            ));
        }

        let status = self
            .exec
            .execute_interactive(K3S_UNINSTALL_SCRIPT, &[])
            .map_err(|e| BootstrapError::install(format!("{:#}", e)))?;
        if !status.success() {
            return Err(BootstrapError::install(format!(
                "{} exited with {}",
                K3S_UNINSTALL_SCRIPT, status
            )));
        }
        println!("✓ k3s uninstalled");
        Ok(())
    }
}

/// Check that `content` is a usable kubeconfig and return its current context
pub fn validate_kubeconfig(content: &str) -> Result<String> {
    let docs = YamlLoader::load_from_str(content).context("Kubeconfig is not valid YAML")?;
    let doc = docs.first().context("Kubeconfig is empty")?;

    if doc["apiVersion"].as_str().is_none() {
        bail!("Kubeconfig has no apiVersion");
    }
    let has_clusters = doc["clusters"]
        .as_vec()
        .map(|clusters| !clusters.is_empty())
        .unwrap_or(false);
    if !has_clusters {
        bail!("Kubeconfig defines no clusters");
    }

    Ok(doc["current-context"]
        .as_str()
        .unwrap_or("default")
        .to_string())
}
