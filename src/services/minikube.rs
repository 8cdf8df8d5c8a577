//! Minikube backend: one named profile driven through the minikube CLI

use super::addons::{self, Addon, AddonSource};
use super::kubectl::Kubectl;
use super::{AccessInfo, ClusterState, Provisioner, apply_remote_manifest};
use crate::config::{Backend, BootstrapConfig, Timings};
use crate::error::BootstrapError;
use crate::utils::{CommandExecutor, ManifestSource, failure_message};
use serde::Deserialize;
use tracing::{debug, warn};

const INSTALL_HINT: &str = "Install minikube manually, then re-run:\n  \
     Linux:  curl -LO https://storage.googleapis.com/minikube/releases/latest/minikube-linux-amd64 && \
     sudo install minikube-linux-amd64 /usr/local/bin/minikube\n  \
     macOS:  brew install minikube\n  \
     Docs:   https://minikube.sigs.k8s.io/docs/start/";

const KUBECTL_HINT: &str = "Install kubectl: https://kubernetes.io/docs/tasks/tools/ \
     (or use 'minikube kubectl --' and add an alias)";

/// Fields of `minikube status -o json` that matter for readiness
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MinikubeStatus {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub kubelet: String,
    #[serde(rename = "APIServer", default)]
    pub api_server: String,
}

impl MinikubeStatus {
    pub fn state(&self) -> ClusterState {
        let running = |s: &str| s == "Running";
        match self.host.as_str() {
            "Running" if running(&self.kubelet) && running(&self.api_server) => ClusterState::Ready,
            "Running" | "Starting" => ClusterState::Starting,
            "Stopped" | "Paused" => ClusterState::Stopped,
            _ => ClusterState::Unknown,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusOutput {
    Single(MinikubeStatus),
    // Multi-node profiles report one object per node
    Nodes(Vec<MinikubeStatus>),
}

/// Parse `minikube status -o json`; the control-plane node comes first.
///
/// Returns `None` when there is no JSON (e.g. the profile does not exist).
pub fn parse_minikube_status(stdout: &str) -> Option<MinikubeStatus> {
    match serde_json::from_str::<StatusOutput>(stdout.trim()).ok()? {
        StatusOutput::Single(status) => Some(status),
        StatusOutput::Nodes(nodes) => nodes.into_iter().next(),
    }
}

pub struct Minikube<'a> {
    exec: &'a dyn CommandExecutor,
    source: &'a dyn ManifestSource,
    config: &'a BootstrapConfig,
}

impl<'a> Minikube<'a> {
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

    fn profile(&self) -> &str {
        &self.config.cluster_name
    }

    fn start_args(&self, state: ClusterState) -> Vec<String> {
        let mut args = vec![
            "start".to_string(),
            "-p".to_string(),
            self.profile().to_string(),
        ];
        // An existing profile keeps its resources; minikube warns if they are passed again
        if state == ClusterState::Unknown {
            let addons = addons::native_addon_list(&self.addons());
            args.extend([
                format!("--memory={}", self.config.memory_mb),
                format!("--cpus={}", self.config.cpus),
                format!("--driver={}", self.config.driver),
                format!("--kubernetes-version={}", self.config.kubernetes_version),
                format!("--addons={}", addons),
            ]);
        }
        args
    }
}

impl Provisioner for Minikube<'_> {
    fn backend(&self) -> Backend {
        Backend::Minikube
    }

    fn check_tools(&self) -> Result<(), BootstrapError> {
        if !self.exec.check_command_exists("minikube") {
            return Err(BootstrapError::tool_missing("minikube", INSTALL_HINT));
        }
        if !self.exec.check_command_exists("kubectl") {
            return Err(BootstrapError::tool_missing("kubectl", KUBECTL_HINT));
        }
        Ok(())
    }

    fn ensure_tool_installed(&self) -> Result<(), BootstrapError> {
        self.check_tools()?;
        println!("✓ minikube and kubectl found");
        Ok(())
    }

    fn detect_existing_cluster(&self) -> ClusterState {
        // minikube exits non-zero for anything but "running" yet still prints JSON
        let output = match self
            .exec
            .execute_simple("minikube", &["status", "-p", self.profile(), "-o", "json"])
        {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, "minikube status failed");
                return ClusterState::Unknown;
            }
        };

        match parse_minikube_status(&String::from_utf8_lossy(&output.stdout)) {
            Some(status) => {
                debug!(?status, "minikube status");
                status.state()
            }
            None => ClusterState::Unknown,
        }
    }

    fn install_or_start(&self, state: ClusterState) -> Result<(), BootstrapError> {
        let args = self.start_args(state);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        if state == ClusterState::Unknown {
            println!("Creating minikube cluster '{}'...", self.profile());
        } else {
            println!("Starting existing minikube cluster '{}' ({})...", self.profile(), state);
        }

        let status = self
            .exec
            .execute_interactive("minikube", &args)
            .map_err(|e| BootstrapError::install(format!("{:#}", e)))?;
        if !status.success() {
            return Err(BootstrapError::install(format!(
                "minikube start -p {} exited with {}",
                self.profile(),
                status
            )));
        }
        println!("✓ minikube cluster '{}' started", self.profile());
        Ok(())
    }

    fn wait_for_ready(&self, timings: &Timings) -> Result<(), BootstrapError> {
        println!(
            "Waiting for nodes to become Ready (timeout {}s)...",
            timings.ready_timeout.as_secs()
        );
        let ready = self
            .kubectl()
            .wait_nodes_ready(timings.ready_timeout)
            .map_err(|e| BootstrapError::install(format!("{:#}", e)))?;
        if !ready {
            return Err(BootstrapError::Timeout {
                what: format!("minikube cluster '{}'", self.profile()),
                timeout: timings.ready_timeout,
            });
        }
        println!("✓ Nodes are Ready");
        Ok(())
    }

    fn configure_access(&self) -> Result<AccessInfo, BootstrapError> {
        self.kubectl()
            .use_context(self.profile())
            .map_err(|e| BootstrapError::config(format!("{:#}", e)))?;
        println!("✓ kubectl context switched to '{}'", self.profile());

        let username = self.config.user();
        let kubeconfig = match self.exec.lookup_user(&username) {
            Ok(Some(user)) => Some(user.home.join(".kube").join("config")),
            Ok(None) | Err(_) => {
                warn!(user = %username, "could not resolve home directory");
                None
            }
        };

        Ok(AccessInfo {
            context: self.profile().to_string(),
            kubeconfig,
        })
    }

    fn kubectl(&self) -> Kubectl<'_> {
        Kubectl::with_context(self.exec, self.profile())
    }

    fn addons(&self) -> Vec<Addon> {
        addons::minikube_addons()
    }

    fn deploy_addon(&self, addon: &Addon) -> Result<(), BootstrapError> {
        match &addon.source {
            AddonSource::Native(name) => {
                let output = self
                    .exec
                    .execute_simple("minikube", &["addons", "enable", *name, "-p", self.profile()])
                    .map_err(|e| BootstrapError::apply(format!("{:#}", e)))?;
                if !output.status.success() {
                    return Err(BootstrapError::apply(format!(
                        "minikube addons enable {} failed: {}",
                        name,
                        failure_message(&output)
                    )));
                }
                Ok(())
            }
            AddonSource::Manifest { url, sha256 } => apply_remote_manifest(
                self.source,
                &self.kubectl(),
                addon.name,
                url,
                sha256.as_deref(),
            ),
        }
    }

    fn teardown(&self) -> Result<(), BootstrapError> {
        if !self.exec.check_command_exists("minikube") {
            return Err(BootstrapError::tool_missing("minikube", INSTALL_HINT));
        }

        let status = self
            .exec
            .execute_interactive("minikube", &["delete", "-p", self.profile()])
            .map_err(|e| BootstrapError::install(format!("{:#}", e)))?;
        if !status.success() {
            return Err(BootstrapError::install(format!(
                "minikube delete -p {} exited with {}",
                self.profile(),
                status
            )));
        }
        println!("✓ minikube cluster '{}' deleted", self.profile());
        Ok(())
    }
}
