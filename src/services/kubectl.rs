//! Thin kubectl wrapper with typed status parsing
//!
//! Readiness is read from `-o json` output rather than by grepping the table
//! output, so a node named "NotReady-1" can never look ready.

use crate::utils::exec::{CommandExecutor, failure_message};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ResourceList {
    #[serde(default)]
    items: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    status: Status,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Status {
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(rename = "type")]
    type_: String,
    status: String,
}

/// Name and readiness of one node or pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStatus {
    pub name: String,
    pub ready: bool,
    pub phase: Option<String>,
}

/// Parse `kubectl get <nodes|pods> -o json`
pub fn parse_resource_list(json: &str) -> Result<Vec<ResourceStatus>> {
    let list: ResourceList =
        serde_json::from_str(json).context("Failed to parse kubectl JSON output")?;

    Ok(list
        .items
        .into_iter()
        .map(|item| ResourceStatus {
            ready: item
                .status
                .conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True"),
            name: item.metadata.name,
            phase: item.status.phase,
        })
        .collect())
}

/// At least one node reports Ready=True
pub fn any_ready(nodes: &[ResourceStatus]) -> bool {
    nodes.iter().any(|n| n.ready)
}

/// Every running pod is Ready and there is at least one.
///
/// Completed pods (admission jobs and the like) are ignored.
pub fn all_pods_ready(pods: &[ResourceStatus]) -> bool {
    let mut live = pods
        .iter()
        .filter(|p| p.phase.as_deref() != Some("Succeeded"))
        .peekable();
    live.peek().is_some() && live.all(|p| p.ready)
}

/// Longest single API request a readiness probe makes
pub const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// `--request-timeout` for a probe with `remaining` time before its deadline.
///
/// Capped at [`PROBE_REQUEST_TIMEOUT`] and never zero, which kubectl reads
/// as "no timeout".
pub fn request_timeout_arg(remaining: Duration) -> String {
    let millis = remaining.min(PROBE_REQUEST_TIMEOUT).as_millis().max(1);
    format!("--request-timeout={}ms", millis)
}

/// kubectl bound to one cluster
pub struct Kubectl<'a> {
    exec: &'a dyn CommandExecutor,
    program: &'static str,
    prefix: Vec<String>,
}

impl<'a> Kubectl<'a> {
    /// The kubectl embedded in k3s, which reads /etc/rancher/k3s/k3s.yaml
    pub fn k3s(exec: &'a dyn CommandExecutor) -> Self {
        Self {
            exec,
            program: "k3s",
            prefix: vec!["kubectl".to_string()],
        }
    }

    /// Standalone kubectl pinned to a kubeconfig context
    pub fn with_context(exec: &'a dyn CommandExecutor, context: &str) -> Self {
        Self {
            exec,
            program: "kubectl",
            prefix: vec!["--context".to_string(), context.to_string()],
        }
    }

    fn full_args<'b>(&'b self, args: &[&'b str]) -> Vec<&'b str> {
        self.prefix
            .iter()
            .map(String::as_str)
            .chain(args.iter().copied())
            .collect()
    }

    /// Human-readable command line, for diagnostics
    pub fn describe(&self, args: &[&str]) -> String {
        let mut parts = vec![self.program];
        parts.extend(self.full_args(args));
        parts.join(" ")
    }

    /// Run a kubectl command and return its stdout, failing on non-zero exit
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.exec.execute_simple(self.program, &self.full_args(args))?;
        if !output.status.success() {
            bail!("'{}' failed: {}", self.describe(args), failure_message(&output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// `kubectl apply -f -` with the manifest on stdin
    pub fn apply(&self, manifest: &str) -> Result<String> {
        let args = ["apply", "-f", "-"];
        let output = self.exec.execute_with_input(
            self.program,
            &self.full_args(&args),
            &[],
            manifest.as_bytes(),
        )?;
        if !output.status.success() {
            bail!("'{}' failed: {}", self.describe(&args), failure_message(&output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Render `generate` client-side, then apply it.
    ///
    /// `kubectl create` errors on existing objects; apply does not, so
    /// re-running is harmless.
    pub fn apply_generated(&self, generate: &[&str]) -> Result<String> {
        let mut args = generate.to_vec();
        args.extend(["--dry-run=client", "-o", "yaml"]);
        let manifest = self.run(&args)?;
        self.apply(&manifest)
    }

    /// Nodes, giving up on the API server after `request_timeout`
    pub fn nodes(&self, request_timeout: Duration) -> Result<Vec<ResourceStatus>> {
        let timeout = request_timeout_arg(request_timeout);
        let json = self.run(&["get", "nodes", "-o", "json", timeout.as_str()])?;
        parse_resource_list(&json)
    }

    pub fn pods(
        &self,
        namespace: &str,
        selector: &str,
        request_timeout: Duration,
    ) -> Result<Vec<ResourceStatus>> {
        let timeout = request_timeout_arg(request_timeout);
        let json = self.run(&[
            "get", "pods", "-n", namespace, "-l", selector, "-o", "json", timeout.as_str(),
        ])?;
        parse_resource_list(&json)
    }

    /// kubectl's own blocking wait for all nodes; `false` when it gives up
    pub fn wait_nodes_ready(&self, timeout: Duration) -> Result<bool> {
        let timeout_arg = format!("--timeout={}s", timeout.as_secs().max(1));
        let args = [
            "wait",
            "--for=condition=Ready",
            "nodes",
            "--all",
            timeout_arg.as_str(),
        ];
        let output = self.exec.execute_simple(self.program, &self.full_args(&args))?;
        Ok(output.status.success())
    }

    pub fn use_context(&self, context: &str) -> Result<()> {
        self.run(&["config", "use-context", context])?;
        Ok(())
    }
}
