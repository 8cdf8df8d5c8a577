//! Add-ons installed on every fresh cluster

use crate::config::BootstrapConfig;

/// Where an add-on comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddonSource {
    /// Remote manifest applied with kubectl, optionally pinned by SHA-256
    Manifest { url: String, sha256: Option<String> },
    /// Addon built into the backend (`minikube addons enable <name>`)
    Native(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addon {
    pub name: &'static str,
    pub source: AddonSource,
    /// Namespace the add-on's pods run in
    pub namespace: &'static str,
    /// Label selector that identifies the pods to wait for
    pub selector: &'static str,
}

pub const INGRESS_NAMESPACE: &str = "ingress-nginx";
pub const INGRESS_SELECTOR: &str = "app.kubernetes.io/component=controller";
pub const METRICS_SERVER_NAMESPACE: &str = "kube-system";
pub const METRICS_SERVER_SELECTOR: &str = "k8s-app=metrics-server";
pub const DASHBOARD_NAMESPACE: &str = "kubernetes-dashboard";
pub const DASHBOARD_SELECTOR: &str = "k8s-app=kubernetes-dashboard";

/// ingress-nginx (bare-metal flavor) and metrics-server from upstream manifests
pub fn k3s_addons(config: &BootstrapConfig) -> Vec<Addon> {
    vec![
        Addon {
            name: "ingress-nginx",
            source: AddonSource::Manifest {
                url: config.ingress_manifest_url.clone(),
                sha256: config.ingress_sha256.clone(),
            },
            namespace: INGRESS_NAMESPACE,
            selector: INGRESS_SELECTOR,
        },
        Addon {
            name: "metrics-server",
            source: AddonSource::Manifest {
                url: config.metrics_server_manifest_url.clone(),
                sha256: config.metrics_server_sha256.clone(),
            },
            namespace: METRICS_SERVER_NAMESPACE,
            selector: METRICS_SERVER_SELECTOR,
        },
    ]
}

/// Minikube's bundled ingress, metrics-server and dashboard addons
pub fn minikube_addons() -> Vec<Addon> {
    vec![
        Addon {
            name: "ingress",
            source: AddonSource::Native("ingress"),
            namespace: INGRESS_NAMESPACE,
            selector: INGRESS_SELECTOR,
        },
        Addon {
            name: "metrics-server",
            source: AddonSource::Native("metrics-server"),
            namespace: METRICS_SERVER_NAMESPACE,
            selector: METRICS_SERVER_SELECTOR,
        },
        Addon {
            name: "dashboard",
            source: AddonSource::Native("dashboard"),
            namespace: DASHBOARD_NAMESPACE,
            selector: DASHBOARD_SELECTOR,
        },
    ]
}

/// Comma-separated native addon names, for `minikube start --addons`
pub fn native_addon_list(addons: &[Addon]) -> String {
    addons
        .iter()
        .filter_map(|a| match a.source {
            AddonSource::Native(name) => Some(name),
            AddonSource::Manifest { .. } => None,
        })
        .collect::<Vec<_>>()
        .join(",")
}
