// uiforge-cluster library
// Local Kubernetes cluster bootstrap (k3s or Minikube) with standard add-ons

pub mod bootstrap;
pub mod commands;
pub mod config;
pub mod error;
pub mod services;
pub mod summary;
pub mod utils;

// Re-export commonly used items
pub use bootstrap::{BootstrapState, Bootstrapper, Outcome, Report};
pub use config::{Backend, BootstrapConfig, Timings};
pub use error::{BootstrapError, ErrorKind};
pub use services::ClusterState;
