//! Operator-facing run summary

use crate::bootstrap::Report;
use crate::config::{Backend, BootstrapConfig};
use crate::error::teardown_command;
use std::fmt::Write;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

pub fn print_summary(report: &Report, config: &BootstrapConfig) {
    print!("{}", render_summary(report, config));
}

pub fn print_already_ready(config: &BootstrapConfig) {
    print!("{}", render_already_ready(config));
}

/// Guidance printed after a successful provisioning run
pub fn render_summary(report: &Report, config: &BootstrapConfig) -> String {
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "✓ {} cluster '{}' is ready", report.backend, report.cluster_name);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out);
    let _ = writeln!(out, "  Context:    {}", report.access.context);
    match report.access.kubeconfig {
        Some(ref path) => {
            let _ = writeln!(out, "  Kubeconfig: {}", path.display());
        }
        None => {
            let _ = writeln!(out, "  Kubeconfig: kubectl default ($KUBECONFIG or ~/.kube/config)");
        }
    }
    let _ = writeln!(out, "  Namespace:  {}", report.namespace);
    let _ = writeln!(out, "  Add-ons:    {}", report.addons.join(", "));
    if let Some(ref user) = report.cluster_admin {
        let _ = writeln!(out, "  Admin:      {} (cluster-admin)", user);
    }
    let _ = writeln!(out, "  Took:       {}s", report.elapsed.as_secs());
    let _ = writeln!(out);
    let _ = writeln!(out, "Use the cluster from a new shell:");
    if let Some(ref path) = report.access.kubeconfig {
        let _ = writeln!(out, "  export KUBECONFIG={}", path.display());
    }
    let _ = writeln!(out, "  kubectl config use-context {}", report.access.context);
    let _ = writeln!(out, "  kubectl get pods -n {}", report.namespace);
    let _ = writeln!(out);

    match report.backend {
        Backend::K3s => {
            let _ = writeln!(out, "Ingress (NodePort):");
            let _ = writeln!(out, "  kubectl get svc -n ingress-nginx ingress-nginx-controller");
            let _ = writeln!(out, "Service status:");
            let _ = writeln!(out, "  sudo systemctl status k3s");
        }
        Backend::Minikube => {
            let _ = writeln!(out, "Dashboard:");
            let _ = writeln!(out, "  minikube dashboard -p {}", report.cluster_name);
            let _ = writeln!(out, "Ingress address:");
            let _ = writeln!(out, "  minikube ip -p {}", report.cluster_name);
            let _ = writeln!(out, "Stop without deleting:");
            let _ = writeln!(out, "  minikube stop -p {}", report.cluster_name);
        }
    }
    let _ = writeln!(out, "Metrics:");
    let _ = writeln!(out, "  kubectl top nodes");
    let _ = writeln!(out, "Tear down:");
    let _ = writeln!(out, "  {}", teardown_command(config));

    out
}

/// Note printed when the run short-circuits on a healthy cluster
pub fn render_already_ready(config: &BootstrapConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "✓ {} cluster '{}' is already running, nothing to do",
        config.backend, config.cluster_name
    );
    match config.backend {
        Backend::K3s => {
            let _ = writeln!(out, "  kubectl get nodes");
        }
        Backend::Minikube => {
            let _ = writeln!(out, "  kubectl config use-context {}", config.cluster_name);
        }
    }
    out
}
