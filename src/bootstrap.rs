//! Supervised bootstrap: retry the full startup sequence with a fixed delay.
//!
//! Subgraphs may start in any order relative to the gateway (container
//! orchestration without explicit dependency ordering), so a first
//! composition attempt racing a not-yet-ready subgraph is an expected,
//! recoverable condition. Startup is retried up to a fixed bound, or forever
//! when configured, with a fixed delay between attempts.

use std::time::Duration;

use tracing::{error, info};

/// Maximum retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(15);

/// Terminal result of the bootstrap loop.
#[derive(Debug)]
pub enum BootstrapOutcome<T> {
    /// Startup succeeded; the gateway is serving.
    Healthy(T),
    /// Retries exhausted. `attempts` counts every attempt made, including
    /// the initial one.
    Aborted { attempts: u32, error: anyhow::Error },
}

impl<T> BootstrapOutcome<T> {
    /// Process exit code this outcome maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Healthy(_) => 0,
            Self::Aborted { .. } => 1,
        }
    }
}

/// Retry supervisor for the startup sequence.
///
/// The attempt counter lives inside [`run`](Self::run) rather than in ambient
/// process state, so the state machine is unit-testable without process-level
/// side effects; mapping an aborted outcome to `process::exit` is the
/// caller's decision.
#[derive(Debug, Clone)]
pub struct BootstrapSupervisor {
    max_retries: u32,
    retry_delay: Duration,
    retry_forever: bool,
}

impl Default for BootstrapSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapSupervisor {
    pub fn new() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            retry_forever: false,
        }
    }

    /// Never abort; keep retrying until startup succeeds.
    pub fn retry_forever(mut self, forever: bool) -> Self {
        self.retry_forever = forever;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Drive `start` until it succeeds or retries are exhausted.
    ///
    /// `start` receives the number of failed attempts so far (0 on the
    /// initial attempt). Every failure is logged with the attempt count
    /// before any recovery action.
    pub async fn run<T, F, Fut>(&self, mut start: F) -> BootstrapOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut failed_attempts: u32 = 0;

        loop {
            match start(failed_attempts).await {
                Ok(value) => {
                    if failed_attempts > 0 {
                        info!(retries = failed_attempts, "gateway started after retries");
                    }
                    return BootstrapOutcome::Healthy(value);
                }
                Err(error) => {
                    error!(attempt = failed_attempts, error = %error, "gateway startup failed");

                    if !self.retry_forever && failed_attempts >= self.max_retries {
                        return BootstrapOutcome::Aborted {
                            attempts: failed_attempts + 1,
                            error,
                        };
                    }

                    tokio::time::sleep(self.retry_delay).await;
                    failed_attempts += 1;
                }
            }
        }
    }
}
