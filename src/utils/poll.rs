//! Fixed-interval polling with a hard deadline.
//!
//! Every readiness wait in the bootstrapper goes through [`poll_until`]. The
//! probe runs immediately, then once per interval; the final sleep is clipped
//! to the deadline, so a wait never exceeds `timeout` plus one probe.

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::debug;

/// The probe never produced a value before the deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTimeout {
    pub elapsed: Duration,
    pub attempts: u32,
    /// Error text of the last failed probe, if the last probe errored
    pub last_error: Option<String>,
}

/// Call `probe` until it returns `Ok(Some(_))` or `timeout` elapses.
///
/// The probe receives the time left before the deadline and must not block
/// longer than that. Probe errors count as "not yet": the external tool may
/// not be answering while the control plane comes up.
pub fn poll_until<T, F>(
    what: &str,
    interval: Duration,
    timeout: Duration,
    mut probe: F,
) -> Result<T, PollTimeout>
where
    F: FnMut(Duration) -> Result<Option<T>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last_error = None;

    loop {
        attempts += 1;

        let remaining = timeout.saturating_sub(start.elapsed());
        match probe(remaining) {
            Ok(Some(value)) => {
                debug!(what, attempts, elapsed_ms = start.elapsed().as_millis(), "poll satisfied");
                return Ok(value);
            }
            Ok(None) => {
                last_error = None;
                debug!(what, attempts, "not ready yet");
            }
            Err(e) => {
                debug!(what, attempts, error = %e, "probe failed");
                last_error = Some(format!("{:#}", e));
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(PollTimeout {
                elapsed,
                attempts,
                last_error,
            });
        }

        std::thread::sleep(interval.min(timeout - elapsed));
    }
}
