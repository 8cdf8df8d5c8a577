pub mod fake;
mod minikube;

use std::time::Duration;
use uiforge_cluster::Timings;

/// Millisecond-scale waits so timeouts are observable in a unit test
pub fn fast_timings() -> Timings {
    Timings {
        poll_interval: Duration::from_millis(10),
        ready_timeout: Duration::from_millis(200),
        addon_timeout: Duration::from_millis(150),
    }
}
