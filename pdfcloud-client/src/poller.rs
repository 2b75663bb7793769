//! Task status polling.
//!
//! A submitted task moves `Submitted -> Running -> Done | Failed`. Each status
//! query yields a [`PollOutcome`]; the poller keeps asking at a fixed interval
//! until the task is done, fails, or the [`PollPolicy`] limits are reached.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{CloudApiClient, TaskHandle};
use crate::error::{ClientError, ClientResult};

/// Default delay between status queries
pub const DEFAULT_INTERVAL_MS: u64 = 2000;

/// Default cap on status queries (10 minutes at the default interval)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 300;

/// Result of a single status query
#[derive(Debug)]
pub enum PollOutcome {
    /// Task still in progress. `percentage` is `None` when the service only
    /// reported that the task is running.
    Pending { percentage: Option<u8> },
    /// Task finished; `doc_id` identifies the result document
    Done { doc_id: String },
    /// Terminal error; polling stops
    Failed(ClientError),
}

/// Lifecycle of a server-side task as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Submitted,
    Running,
    Done,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }
}

/// Applies poll outcomes to a task's state
#[derive(Debug, Clone)]
pub struct TaskTracker {
    state: TaskState,
    attempts: u32,
    last_percentage: Option<u8>,
}

impl Default for TaskTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskTracker {
    pub fn new() -> Self {
        Self {
            state: TaskState::Submitted,
            attempts: 0,
            last_percentage: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Number of outcomes applied so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_percentage(&self) -> Option<u8> {
        self.last_percentage
    }

    /// Record one outcome and return the new state. Terminal states are final.
    pub fn apply(&mut self, outcome: &PollOutcome) -> TaskState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.attempts += 1;
        self.state = match outcome {
            PollOutcome::Pending { percentage } => {
                if percentage.is_some() {
                    self.last_percentage = *percentage;
                }
                TaskState::Running
            }
            PollOutcome::Done { .. } => {
                self.last_percentage = Some(100);
                TaskState::Done
            }
            PollOutcome::Failed(_) => TaskState::Failed,
        };
        self.state
    }
}

/// Interval and limits for a polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Stop after this many status queries; `None` polls forever
    pub max_attempts: Option<u32>,
    /// Stop once this much time has passed; `None` for no limit
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
            max_wait: None,
        }
    }
}

impl PollPolicy {
    /// Poll until the service reports completion or a terminal error
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
            max_wait: None,
        }
    }
}

/// Progress report handed to observers after every status query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskProgress {
    pub attempt: u32,
    pub percentage: Option<u8>,
    pub state: TaskState,
}

/// Completed polling run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub doc_id: String,
    pub attempts: u32,
}

/// Polls a task until it completes
pub struct TaskPoller<'a> {
    api: &'a CloudApiClient,
    policy: PollPolicy,
}

impl<'a> TaskPoller<'a> {
    pub fn new(api: &'a CloudApiClient, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    /// Wait for the task to finish, logging progress
    pub async fn wait(&self, handle: &TaskHandle) -> ClientResult<PollResult> {
        self.wait_with_progress(handle, |_| {}).await
    }

    /// Wait for the task to finish, reporting each status query to `on_progress`
    pub async fn wait_with_progress<F>(
        &self,
        handle: &TaskHandle,
        mut on_progress: F,
    ) -> ClientResult<PollResult>
    where
        F: FnMut(&TaskProgress),
    {
        let started = Instant::now();
        let mut tracker = TaskTracker::new();

        loop {
            let outcome = self.api.query_status(handle).await;
            let state = tracker.apply(&outcome);
            let attempt = tracker.attempts();

            match outcome {
                PollOutcome::Done { doc_id } => {
                    on_progress(&TaskProgress {
                        attempt,
                        percentage: Some(100),
                        state,
                    });
                    info!(
                        task_id = %handle.task_id(),
                        doc_id = %doc_id,
                        attempts = attempt,
                        "Task completed"
                    );
                    return Ok(PollResult {
                        doc_id,
                        attempts: attempt,
                    });
                }
                PollOutcome::Failed(e) => {
                    warn!(task_id = %handle.task_id(), error = %e, "Task polling failed");
                    return Err(e);
                }
                PollOutcome::Pending { percentage } => {
                    on_progress(&TaskProgress {
                        attempt,
                        percentage,
                        state,
                    });
                    match percentage {
                        Some(p) => info!(task_id = %handle.task_id(), percentage = p, "Task progress"),
                        None => debug!(
                            task_id = %handle.task_id(),
                            retry_in_ms = self.policy.interval.as_millis() as u64,
                            "Task is running"
                        ),
                    }
                }
            }

            let elapsed = started.elapsed();
            let attempts_exhausted = self.policy.max_attempts.is_some_and(|max| attempt >= max);
            let time_exhausted = self.policy.max_wait.is_some_and(|max| elapsed >= max);
            if attempts_exhausted || time_exhausted {
                return Err(ClientError::PollLimitExceeded {
                    attempts: attempt,
                    elapsed,
                });
            }

            tokio::time::sleep(self.policy.interval).await;
        }
    }
}
