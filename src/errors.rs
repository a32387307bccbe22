use thiserror::Error;

use crate::models::TaskId;

pub type Result<T> = std::result::Result<T, SongError>;

#[derive(Debug, Error)]
pub enum SongError {
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// Status query could not reach the service; the poller spends one check on it.
    #[error("status query unavailable: {0}")]
    StatusUnavailable(String),

    #[error("task {task_id} failed with status {status}: {message}")]
    JobFailed {
        task_id: TaskId,
        status: String,
        message: String,
    },

    #[error("task {task_id} still not finished after {checks} checks")]
    Timeout { task_id: TaskId, checks: u32 },

    #[error("monitoring of task {task_id} was cancelled")]
    Cancelled { task_id: TaskId },

    #[error("interrupted before the song was submitted")]
    Interrupted,

    #[error("no task id given and no resume marker found at {0}")]
    NoResumeMarker(String),

    #[error("image generation failed: {0}")]
    ImageGeneration(#[from] rig::image_generation::ImageGenerationError),

    #[error("download failed: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl SongError {
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Task id to mention in resume instructions, if the error leaves the job resumable.
    pub fn resumable_task(&self) -> Option<&TaskId> {
        match self {
            SongError::Timeout { task_id, .. } | SongError::Cancelled { task_id } => Some(task_id),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for SongError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(format!("{value:#}"))
    }
}
