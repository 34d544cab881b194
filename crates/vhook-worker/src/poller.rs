//! Remote job polling as an explicit state machine.
//!
//! `Submitted -> Polling { attempt } -> Succeeded | RemoteFailed | TimedOut`
//!
//! `attempt` counts status checks already made. The first check happens
//! immediately; later ones are spaced by the configured interval, and the
//! machine times out once `max_attempts` checks reported the job pending.

use std::time::Duration;

use tracing::debug;
use vhook_video_client::{JobPoll, VideoGenerator, VideoResult};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// State of one remote job as seen by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Submitted { job_id: String },
    Polling { job_id: String, attempt: u32 },
    Succeeded { result_url: String },
    RemoteFailed { reason: String },
    TimedOut { job_id: String, attempts: u32 },
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Succeeded { .. } | PollState::RemoteFailed { .. } | PollState::TimedOut { .. }
        )
    }
}

/// Drives a [`PollState`] to a terminal state.
#[derive(Debug, Clone, Copy)]
pub struct JobPoller {
    interval: Duration,
    max_attempts: u32,
}

impl JobPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.poll_interval, config.max_poll_attempts)
    }

    /// Advance the machine by one transition.
    ///
    /// Transport errors from the generator are returned as-is; the caller
    /// treats them like a failed job.
    pub async fn step(&self, generator: &dyn VideoGenerator, state: PollState) -> VideoResult<PollState> {
        match state {
            PollState::Submitted { job_id } => Ok(PollState::Polling { job_id, attempt: 0 }),
            PollState::Polling { job_id, attempt } => {
                if attempt >= self.max_attempts {
                    return Ok(PollState::TimedOut {
                        job_id,
                        attempts: attempt,
                    });
                }
                if attempt > 0 {
                    tokio::time::sleep(self.interval).await;
                }

                let next = match generator.poll(&job_id).await? {
                    JobPoll::Pending => PollState::Polling {
                        job_id,
                        attempt: attempt + 1,
                    },
                    JobPoll::Succeeded { result_url } => PollState::Succeeded { result_url },
                    JobPoll::Failed { reason } => PollState::RemoteFailed { reason },
                };
                Ok(next)
            }
            terminal => Ok(terminal),
        }
    }

    /// Poll `job_id` until it finishes and return the result URL.
    pub async fn run(&self, generator: &dyn VideoGenerator, job_id: &str) -> WorkerResult<String> {
        let mut state = PollState::Submitted {
            job_id: job_id.to_string(),
        };

        loop {
            state = self.step(generator, state).await?;
            debug!(job_id = %job_id, state = ?state, "Poll state");

            match state {
                PollState::Succeeded { result_url } => return Ok(result_url),
                PollState::RemoteFailed { reason } => return Err(WorkerError::RemoteJobFailed(reason)),
                PollState::TimedOut { job_id, attempts } => {
                    return Err(WorkerError::PollTimedOut { job_id, attempts })
                }
                pending @ (PollState::Submitted { .. } | PollState::Polling { .. }) => state = pending,
            }
        }
    }
}
