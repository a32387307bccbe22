use std::{future::Future, time::Duration};

use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use crate::{
    errors::{Result, SongError},
    models::{Job, JobStatus, TaskId},
    providers::suno::status_description,
    resume::ResumeStore,
    util::Cancellation,
};

pub const DEFAULT_INTERVAL_SECONDS: u64 = 10;
pub const DEFAULT_CHECKS: u32 = 30;

/// Anything that can report the current state of a remote task.
pub trait TaskSource {
    fn fetch_task(&self, task_id: &TaskId) -> impl Future<Output = Result<Job>>;
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub checks: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECONDS),
            checks: DEFAULT_CHECKS,
        }
    }
}

/// Fixed-interval poller shared by fresh submissions and the resume path.
pub struct JobPoller<'a, S, R> {
    source: &'a S,
    store: &'a R,
    settings: PollSettings,
    cancel: Cancellation,
}

impl<'a, S, R> JobPoller<'a, S, R>
where
    S: TaskSource,
    R: ResumeStore,
{
    pub fn new(source: &'a S, store: &'a R, settings: PollSettings, cancel: Cancellation) -> Self {
        Self {
            source,
            store,
            settings: PollSettings {
                checks: settings.checks.max(1),
                ..settings
            },
            cancel,
        }
    }

    /// Records a freshly submitted task in the resume store.
    pub fn persist(&self, task_id: &TaskId) -> Result<()> {
        self.store.write_last(task_id)?;
        info!(target: "poller", %task_id, marker = %self.store.describe(), "task id saved for resume");
        Ok(())
    }

    /// Polls a task that has already been persisted.
    pub async fn follow(&self, task_id: TaskId) -> Result<Job> {
        self.poll(task_id).await
    }

    /// Polls an explicit task, or the one last written to the resume store.
    pub async fn resume(&self, explicit: Option<TaskId>) -> Result<Job> {
        let task_id = match explicit {
            Some(task_id) => {
                self.persist(&task_id)?;
                task_id
            }
            None => {
                let task_id = self
                    .store
                    .read_last()?
                    .ok_or_else(|| SongError::NoResumeMarker(self.store.describe()))?;
                info!(target: "poller", %task_id, marker = %self.store.describe(), "using task id from resume marker");
                task_id
            }
        };

        self.poll(task_id).await
    }

    async fn poll(&self, task_id: TaskId) -> Result<Job> {
        let PollSettings { interval, checks } = self.settings;
        // Slow status queries never stretch the run past checks x interval.
        let deadline = Instant::now() + interval * checks;

        for attempt in 1..=checks {
            if attempt > 1 {
                let wait = deadline.saturating_duration_since(Instant::now()).min(interval);
                if !self.cancel.sleep(wait).await {
                    return Err(SongError::Cancelled { task_id });
                }
            }

            info!(target: "poller", %task_id, "check {attempt}/{checks}");

            let fetched = match timeout_at(deadline, self.source.fetch_task(&task_id)).await {
                Ok(fetched) => fetched,
                Err(_) => {
                    warn!(target: "poller", %task_id, "status query ran past the polling window");
                    break;
                }
            };

            let job = match fetched {
                Ok(job) => job,
                Err(SongError::StatusUnavailable(reason)) => {
                    warn!(target: "poller", %task_id, %reason, "could not retrieve task status");
                    continue;
                }
                Err(err) => return Err(err),
            };

            debug!(
                target: "poller",
                %task_id,
                status = %job.status,
                remote_status = %job.remote_status,
                tracks = job.tracks.len(),
                "status received"
            );

            match job.status {
                JobStatus::Succeeded => {
                    info!(target: "poller", %task_id, "task complete");
                    return Ok(job);
                }
                JobStatus::Failed => {
                    let message = job
                        .message
                        .clone()
                        .unwrap_or_else(|| status_description(&job.remote_status).to_string());
                    return Err(SongError::JobFailed {
                        task_id,
                        status: job.remote_status,
                        message,
                    });
                }
                JobStatus::Pending | JobStatus::Running => {
                    info!(
                        target: "poller",
                        %task_id,
                        "still processing ({}), next check in {}s",
                        status_description(&job.remote_status),
                        interval.as_secs()
                    );
                }
            }
        }

        Err(SongError::Timeout { task_id, checks })
    }
}
