//! Cluster bootstrap sequence
//!
//! Drives one backend through:
//!
//! 1. Preflight (tools, privilege)
//! 2. Existing-cluster detection; a ready cluster ends the run successfully
//! 3. Install or start
//! 4. Node readiness
//! 5. kubectl access
//! 6. Workload namespace
//! 7. Add-ons, each waited on until its pods are ready
//! 8. Optional cluster-admin binding (k3s)
//!
//! Steps run strictly in order. The first failure ends the run; nothing
//! already created is rolled back.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{Backend, BootstrapConfig, Timings};
use crate::error::{BootstrapError, ErrorKind};
use crate::services::kubectl::{Kubectl, all_pods_ready};
use crate::services::{AccessInfo, Addon, ClusterState, Provisioner, provisioner_for};
use crate::utils::{CommandExecutor, ManifestSource, poll_until};

/// Progress of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    NotStarted,
    ToolChecked,
    ShortCircuitReady,
    Installing,
    Started,
    NodesReady,
    AccessConfigured,
    NamespaceReady,
    AddonsReady,
    Done,
    Failed(ErrorKind),
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapState::Failed(kind) => write!(f, "Failed({})", kind),
            other => write!(f, "{:?}", other),
        }
    }
}

/// What a finished run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The cluster was already running; nothing was touched
    AlreadyReady,
    Provisioned(Report),
}

/// Facts gathered during a provisioning run, for the summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub backend: Backend,
    pub cluster_name: String,
    pub access: AccessInfo,
    pub namespace: String,
    pub addons: Vec<String>,
    /// User bound to cluster-admin, when the grant ran
    pub cluster_admin: Option<String>,
    pub elapsed: Duration,
}

pub struct Bootstrapper<'a> {
    exec: &'a dyn CommandExecutor,
    source: &'a dyn ManifestSource,
    config: &'a BootstrapConfig,
    timings: Timings,
    history: Vec<BootstrapState>,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(
        exec: &'a dyn CommandExecutor,
        source: &'a dyn ManifestSource,
        config: &'a BootstrapConfig,
    ) -> Self {
        Self {
            exec,
            source,
            config,
            timings: Timings::from(config),
            history: vec![BootstrapState::NotStarted],
        }
    }

    /// Replace the poll interval and timeouts taken from the config
    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    /// Every state this run passed through, oldest first
    pub fn history(&self) -> &[BootstrapState] {
        &self.history
    }

    pub fn state(&self) -> BootstrapState {
        *self.history.last().unwrap_or(&BootstrapState::NotStarted)
    }

    fn transition(&mut self, next: BootstrapState) {
        info!(from = %self.state(), to = %next, backend = %self.config.backend, "bootstrap state");
        self.history.push(next);
    }

    pub fn run(&mut self) -> Result<Outcome, BootstrapError> {
        let result = self.run_steps();
        if let Err(ref e) = result {
            self.transition(BootstrapState::Failed(e.kind()));
        }
        result
    }

    fn run_steps(&mut self) -> Result<Outcome, BootstrapError> {
        let start = Instant::now();
        let provisioner = provisioner_for(self.config, self.exec, self.source);

        println!("Checking prerequisites for {}...", self.config.backend);
        provisioner.ensure_tool_installed()?;
        self.transition(BootstrapState::ToolChecked);

        let state = provisioner.detect_existing_cluster();
        info!(cluster = %self.config.cluster_name, %state, "existing cluster state");
        if state == ClusterState::Ready {
            self.transition(BootstrapState::ShortCircuitReady);
            return Ok(Outcome::AlreadyReady);
        }

        self.transition(BootstrapState::Installing);
        provisioner.install_or_start(state)?;
        self.transition(BootstrapState::Started);

        provisioner.wait_for_ready(&self.timings)?;
        self.transition(BootstrapState::NodesReady);

        let access = provisioner.configure_access()?;
        self.transition(BootstrapState::AccessConfigured);

        let kubectl = provisioner.kubectl();
        ensure_namespace(&kubectl, &self.config.namespace)?;
        self.transition(BootstrapState::NamespaceReady);

        let addons = provisioner.addons();
        for addon in &addons {
            install_addon(provisioner.as_ref(), addon, &self.timings)?;
        }
        self.transition(BootstrapState::AddonsReady);

        let cluster_admin = if self.config.grant_cluster_admin {
            match self.config.backend {
                Backend::K3s => {
                    let user = self.config.user();
                    grant_cluster_admin(&kubectl, &user)?;
                    Some(user)
                }
                Backend::Minikube => {
                    warn!("cluster-admin grant only applies to k3s; minikube users are already admin");
                    None
                }
            }
        } else {
            None
        };

        self.transition(BootstrapState::Done);

        Ok(Outcome::Provisioned(Report {
            backend: provisioner.backend(),
            cluster_name: self.config.cluster_name.clone(),
            access,
            namespace: self.config.namespace.clone(),
            addons: addons.iter().map(|a| a.name.to_string()).collect(),
            cluster_admin,
            elapsed: start.elapsed(),
        }))
    }
}

/// Create `name` if absent; applying a client-side render never fails on "already exists"
pub fn ensure_namespace(kubectl: &Kubectl<'_>, name: &str) -> Result<(), BootstrapError> {
    kubectl
        .apply_generated(&["create", "namespace", name])
        .map_err(|e| BootstrapError::apply(format!("namespace {}: {:#}", name, e)))?;
    println!("✓ Namespace '{}' ready", name);
    Ok(())
}

/// Deploy an add-on, then wait until every pod matching its selector is ready
pub fn install_addon(
    provisioner: &dyn Provisioner,
    addon: &Addon,
    timings: &Timings,
) -> Result<(), BootstrapError> {
    println!("Installing {}...", addon.name);
    provisioner.deploy_addon(addon)?;

    println!(
        "  Waiting for {} pods ({} in {}, timeout {}s)...",
        addon.name,
        addon.selector,
        addon.namespace,
        timings.addon_timeout.as_secs()
    );
    let kubectl = provisioner.kubectl();
    poll_until(
        addon.name,
        timings.poll_interval,
        timings.addon_timeout,
        |remaining| {
            let pods = kubectl.pods(addon.namespace, addon.selector, remaining)?;
            Ok(all_pods_ready(&pods).then_some(()))
        },
    )
    .map_err(|t| {
        warn!(
            addon = addon.name,
            attempts = t.attempts,
            elapsed_ms = t.elapsed.as_millis(),
            last_error = ?t.last_error,
            "addon readiness timed out"
        );
        BootstrapError::AddonTimeout {
            addon: addon.name.to_string(),
            timeout: timings.addon_timeout,
        }
    })?;

    println!("✓ {} ready", addon.name);
    Ok(())
}

/// Bind `user` to the cluster-admin ClusterRole, idempotently
pub fn grant_cluster_admin(kubectl: &Kubectl<'_>, user: &str) -> Result<(), BootstrapError> {
    let binding = binding_name(user);
    let user_arg = format!("--user={}", user);
    kubectl
        .apply_generated(&[
            "create",
            "clusterrolebinding",
            &binding,
            "--clusterrole=cluster-admin",
            &user_arg,
        ])
        .map_err(|e| BootstrapError::apply(format!("clusterrolebinding {}: {:#}", binding, e)))?;
    println!("✓ User '{}' bound to cluster-admin ({})", user, binding);
    Ok(())
}

/// RBAC object name for a user's admin binding (DNS subdomain safe)
fn binding_name(user: &str) -> String {
    let sanitized: String = user
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '-' })
        .collect();
    format!("{}-cluster-admin", sanitized.trim_matches('-'))
}
