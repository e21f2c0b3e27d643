//! Fixed-interval status polling with a time budget.
//!
//! The poller drives any [`StatusSource`] until it reports a terminal
//! status, the budget runs out, or the caller cancels. Progress is cosmetic:
//! it climbs by a fixed step per pending check, stops below 100 at the cap,
//! and only reaches 100 on success.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One observation of a job's status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Succeeded(String),
    Failed(String),
}

/// Terminal result reported by the job itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// URL of the enhanced image.
    Succeeded(String),
    Failed(String),
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PollError {
    #[error("Enhancement timed out")]
    TimedOut { elapsed: Duration },

    #[error("Polling cancelled")]
    Cancelled,

    #[error("Invalid or expired process ID")]
    UnknownJob,

    #[error("Status check failed: {0}")]
    Source(String),
}

/// Anything that can report the status of a job by id.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn check(&self, id: &str) -> Result<PollStatus, PollError>;
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub progress_step: u8,
    pub progress_cap: u8,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1500),
            timeout: Duration::from_secs(120),
            progress_step: 5,
            progress_cap: 95,
        }
    }
}

/// Monotonic, capped progress percentage.
#[derive(Debug, Clone)]
struct Progress {
    value: u8,
    step: u8,
    cap: u8,
}

impl Progress {
    fn new(step: u8, cap: u8) -> Self {
        Self {
            value: 0,
            step,
            cap: cap.min(99),
        }
    }

    fn advance(&mut self) -> u8 {
        self.value = self.value.saturating_add(self.step).min(self.cap);
        self.value
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusPoller {
    config: PollConfig,
}

impl StatusPoller {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    /// Poll `source` for `id` until a terminal status, the time budget, or
    /// cancellation. `on_progress` sees 0 first, then each step, then 100 on
    /// success.
    pub async fn poll<S, F>(
        &self,
        source: &S,
        id: &str,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<PollOutcome, PollError>
    where
        S: StatusSource + ?Sized,
        F: FnMut(u8) + Send,
    {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let mut progress = Progress::new(self.config.progress_step, self.config.progress_cap);
        on_progress(0);

        loop {
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                checked = tokio::time::timeout_at(deadline, source.check(id)) => match checked {
                    Ok(status) => status?,
                    Err(_) => {
                        let elapsed = started.elapsed();
                        tracing::warn!(job_id = %id, elapsed_ms = elapsed.as_millis() as u64, "Status check outlived the poll budget");
                        return Err(PollError::TimedOut { elapsed });
                    }
                },
            };

            match status {
                PollStatus::Succeeded(url) => {
                    on_progress(100);
                    tracing::debug!(job_id = %id, elapsed_ms = started.elapsed().as_millis() as u64, "Poll observed success");
                    return Ok(PollOutcome::Succeeded(url));
                }
                PollStatus::Failed(message) => {
                    tracing::debug!(job_id = %id, error = %message, "Poll observed failure");
                    return Ok(PollOutcome::Failed(message));
                }
                PollStatus::Pending => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= self.config.timeout {
                tracing::warn!(job_id = %id, elapsed_ms = elapsed.as_millis() as u64, "Poll budget exhausted");
                return Err(PollError::TimedOut { elapsed });
            }

            on_progress(progress.advance());

            let wait = self.config.interval.min(self.config.timeout - elapsed);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Run [`StatusPoller::poll`] on its own task. The returned handle owns
    /// the task: cancelling or dropping it stops polling.
    pub fn spawn<S>(&self, source: Arc<S>, id: impl Into<String>) -> PollHandle
    where
        S: StatusSource + ?Sized + 'static,
    {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(0u8);
        let poller = self.clone();
        let id = id.into();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            poller
                .poll(source.as_ref(), &id, &token, |pct| {
                    tx.send_replace(pct);
                })
                .await
        });

        PollHandle {
            cancel,
            progress: rx,
            task,
        }
    }
}

/// Owner of a spawned polling loop.
pub struct PollHandle {
    cancel: CancellationToken,
    progress: watch::Receiver<u8>,
    task: JoinHandle<Result<PollOutcome, PollError>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Receiver for the latest progress percentage.
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.clone()
    }

    /// Wait for the loop to finish.
    pub async fn outcome(mut self) -> Result<PollOutcome, PollError> {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(PollError::Cancelled),
            Err(e) => Err(PollError::Source(e.to_string())),
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
