use super::fake::{FakeExecutor, FakeSource, Reply, pods_json};
use super::fast_timings;
use std::path::PathBuf;
use uiforge_cluster::commands::cluster::{cluster_status, teardown_cluster};
use uiforge_cluster::{
    Backend, BootstrapConfig, BootstrapError, BootstrapState, Bootstrapper, ClusterState,
    ErrorKind, Outcome,
};

const RUNNING: &str = r#"{"Name":"uiforge-local","Host":"Running","Kubelet":"Running","APIServer":"Running","Kubeconfig":"Configured","Worker":false}"#;
const STOPPED: &str = r#"{"Name":"uiforge-local","Host":"Stopped","Kubelet":"Stopped","APIServer":"Stopped","Kubeconfig":"Stopped","Worker":false}"#;

fn minikube_config() -> BootstrapConfig {
    BootstrapConfig {
        invoking_user: Some("alice".to_string()),
        ..BootstrapConfig::default()
    }
}

fn workstation() -> FakeExecutor {
    FakeExecutor::new()
        .with_tools(&["minikube", "kubectl"])
        .with_user("alice", 1000, "/home/alice")
}

#[test]
fn test_warm_cluster_is_a_no_op_every_time() {
    let config = minikube_config();
    let exec = workstation().on("minikube status", vec![Reply::ok(RUNNING)]);
    let source = FakeSource::new();

    for _ in 0..2 {
        let mut bootstrapper =
            Bootstrapper::new(&exec, &source, &config).with_timings(fast_timings());
        assert_eq!(bootstrapper.run().unwrap(), Outcome::AlreadyReady);
        assert_eq!(
            bootstrapper.history(),
            &[
                BootstrapState::NotStarted,
                BootstrapState::ToolChecked,
                BootstrapState::ShortCircuitReady,
            ]
        );
    }

    assert_eq!(exec.count("minikube status -p uiforge-local -o json"), 2);
    assert_eq!(exec.count("minikube start"), 0);
    assert_eq!(exec.count("addons enable"), 0);
    assert_eq!(exec.count("create namespace"), 0);
}

#[test]
fn test_new_profile_is_created_with_resources_and_addons() {
    let config = minikube_config();
    let exec = workstation()
        .on(
            "minikube status",
            vec![Reply::exit(85, "* Profile \"uiforge-local\" not found.")],
        )
        .on("get pods", vec![Reply::ok(&pods_json(true))]);
    let source = FakeSource::new();

    let mut bootstrapper = Bootstrapper::new(&exec, &source, &config).with_timings(fast_timings());
    let outcome = bootstrapper.run().unwrap();

    assert_eq!(bootstrapper.state(), BootstrapState::Done);
    assert_eq!(
        exec.count(
            "minikube start -p uiforge-local --memory=8192 --cpus=4 --driver=docker \
             --kubernetes-version=v1.28.3 --addons=ingress,metrics-server,dashboard"
        ),
        1
    );
    assert_eq!(
        exec.count("kubectl --context uiforge-local wait --for=condition=Ready nodes --all"),
        1
    );
    assert_eq!(exec.count("kubectl --context uiforge-local config use-context uiforge-local"), 1);
    for addon in ["ingress", "metrics-server", "dashboard"] {
        let enable = format!("minikube addons enable {} -p uiforge-local", addon);
        assert_eq!(exec.count(&enable), 1, "{}", enable);
    }
    assert!(source.fetched().is_empty());

    let Outcome::Provisioned(report) = outcome else {
        panic!("expected a provisioning run");
    };
    assert_eq!(report.access.context, "uiforge-local");
    assert_eq!(report.access.kubeconfig, Some(PathBuf::from("/home/alice/.kube/config")));
    assert_eq!(report.addons, vec!["ingress", "metrics-server", "dashboard"]);
}

#[test]
fn test_stopped_profile_is_restarted_without_resource_flags() {
    let config = minikube_config();
    let exec = workstation()
        .on("minikube status", vec![Reply::exit(7, STOPPED)])
        .on("get pods", vec![Reply::ok(&pods_json(true))]);
    let source = FakeSource::new();

    Bootstrapper::new(&exec, &source, &config)
        .with_timings(fast_timings())
        .run()
        .unwrap();

    let start = exec.first("minikube start").unwrap();
    assert_eq!(exec.calls()[start], "minikube start -p uiforge-local");
}

#[test]
fn test_missing_minikube_reports_tool_and_hint() {
    let config = minikube_config();
    let exec = FakeExecutor::new().with_tools(&["kubectl"]);
    let source = FakeSource::new();

    let mut bootstrapper = Bootstrapper::new(&exec, &source, &config).with_timings(fast_timings());
    let err = bootstrapper.run().unwrap_err();

    match &err {
        BootstrapError::ToolMissing { tool, hint } => {
            assert_eq!(tool, "minikube");
            assert!(hint.contains("https://minikube.sigs.k8s.io/docs/start/"));
        }
        other => panic!("expected ToolMissing, got {:?}", other),
    }
    assert!(exec.calls().is_empty());
    assert_eq!(bootstrapper.state(), BootstrapState::Failed(ErrorKind::ToolMissing));
}

#[test]
fn test_failed_start_is_an_install_error() {
    let config = minikube_config();
    let exec = workstation()
        .on("minikube status", vec![Reply::exit(85, "")])
        .on("minikube start", vec![Reply::fail(80, "")]);
    let source = FakeSource::new();

    let err = Bootstrapper::new(&exec, &source, &config)
        .with_timings(fast_timings())
        .run()
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Install);
    assert!(err.remediation(&config).contains("minikube delete -p uiforge-local"));
    assert_eq!(exec.count("kubectl"), 0);
}

#[test]
fn test_nodes_never_ready_is_a_timeout() {
    let config = minikube_config();
    let exec = workstation()
        .on("minikube status", vec![Reply::exit(7, STOPPED)])
        .on(
            "wait --for=condition=Ready",
            vec![Reply::fail(1, "error: timed out waiting for the condition on nodes/uiforge-local")],
        );
    let source = FakeSource::new();

    let mut bootstrapper = Bootstrapper::new(&exec, &source, &config).with_timings(fast_timings());
    let err = bootstrapper.run().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.to_string().starts_with("minikube cluster 'uiforge-local' not ready"));
    assert_eq!(bootstrapper.state(), BootstrapState::Failed(ErrorKind::Timeout));
    assert_eq!(exec.count("use-context"), 0);
}

#[test]
fn test_cluster_admin_grant_is_skipped_on_minikube() {
    let config = BootstrapConfig {
        grant_cluster_admin: true,
        ..minikube_config()
    };
    let exec = workstation()
        .on("minikube status", vec![Reply::exit(7, STOPPED)])
        .on("get pods", vec![Reply::ok(&pods_json(true))]);
    let source = FakeSource::new();

    let outcome = Bootstrapper::new(&exec, &source, &config)
        .with_timings(fast_timings())
        .run()
        .unwrap();

    let Outcome::Provisioned(report) = outcome else {
        panic!("expected a provisioning run");
    };
    assert_eq!(report.cluster_admin, None);
    assert_eq!(exec.count("clusterrolebinding"), 0);
}

#[test]
fn test_teardown_deletes_the_profile() {
    let config = minikube_config();
    let exec = workstation();
    let source = FakeSource::new();

    teardown_cluster(&config, &exec, &source).unwrap();

    assert_eq!(exec.calls(), vec!["minikube delete -p uiforge-local".to_string()]);
}

#[test]
fn test_failed_delete_is_an_install_error() {
    let config = minikube_config();
    let exec = workstation().on("minikube delete", vec![Reply::fail(1, "")]);
    let source = FakeSource::new();

    let err = teardown_cluster(&config, &exec, &source).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Install);
    assert!(err.to_string().contains("minikube delete -p uiforge-local"));
}

#[test]
fn test_teardown_without_minikube_is_tool_missing() {
    let config = minikube_config();
    let exec = FakeExecutor::new().with_tools(&["kubectl"]);
    let source = FakeSource::new();

    let err = teardown_cluster(&config, &exec, &source).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ToolMissing);
    assert!(exec.calls().is_empty());
}

#[test]
fn test_status_reports_running_profile() {
    let config = minikube_config();
    let exec = workstation().on("minikube status", vec![Reply::ok(RUNNING)]);
    let source = FakeSource::new();

    let (backend, state) = cluster_status(&config, &exec, &source).unwrap();

    assert_eq!(backend, Backend::Minikube);
    assert_eq!(state, ClusterState::Ready);
    assert_eq!(exec.calls(), vec!["minikube status -p uiforge-local -o json".to_string()]);
}

#[test]
fn test_status_checks_tools_before_querying() {
    let config = minikube_config();
    let exec = FakeExecutor::new().with_tools(&["minikube"]);
    let source = FakeSource::new();

    let err = cluster_status(&config, &exec, &source).unwrap_err();

    match &err {
        BootstrapError::ToolMissing { tool, .. } => assert_eq!(tool, "kubectl"),
        other => panic!("expected ToolMissing, got {:?}", other),
    }
    assert!(exec.calls().is_empty());
}
