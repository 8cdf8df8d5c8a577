// Utils module - host access, downloads and polling shared by the backends
pub mod download;
pub mod exec;
pub mod poll;

// Re-export commonly used utilities
pub use download::{HttpSource, ManifestSource, fetch_verified, sha256_hex};
pub use exec::{CommandExecutor, LocalExecutor, UserInfo, failure_message, stdout_string};
pub use poll::{PollTimeout, poll_until};
