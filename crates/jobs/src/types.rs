//! Task status record and failure taxonomy.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use buildvault_catalog::DataError;
use buildvault_core::{BuildId, TaskId};

/// Lifecycle state of a task.
///
/// `Pending` is the only initial state; `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// Attempted transition out of a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("task {task_id} is already {from:?}; cannot move to {to:?}")]
pub struct InvalidTransition {
    pub task_id: TaskId,
    pub from: TaskState,
    pub to: TaskState,
}

/// Status record of one background task.
///
/// `artifact_path` is set iff the state is `Completed`; `error_message` is
/// set iff the state is `Failed`. The transition methods are the only way to
/// reach a terminal state, and they refuse to leave one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    task_id: TaskId,
    target: BuildId,
    state: TaskState,
    artifact_path: Option<PathBuf>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskStatus {
    pub fn pending(task_id: TaskId, target: BuildId) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            target,
            state: TaskState::Pending,
            artifact_path: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn complete(self, artifact_path: PathBuf) -> Result<Self, InvalidTransition> {
        self.ensure_pending(TaskState::Completed)?;
        Ok(Self {
            state: TaskState::Completed,
            artifact_path: Some(artifact_path),
            error_message: None,
            updated_at: Utc::now(),
            ..self
        })
    }

    pub fn fail(self, message: impl Into<String>) -> Result<Self, InvalidTransition> {
        self.ensure_pending(TaskState::Failed)?;
        Ok(Self {
            state: TaskState::Failed,
            artifact_path: None,
            error_message: Some(message.into()),
            updated_at: Utc::now(),
            ..self
        })
    }

    fn ensure_pending(&self, to: TaskState) -> Result<(), InvalidTransition> {
        if self.state.is_terminal() {
            return Err(InvalidTransition {
                task_id: self.task_id,
                from: self.state,
                to,
            });
        }
        Ok(())
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Build the task was started for.
    pub fn target(&self) -> BuildId {
        self.target
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Why a job ended in `Failed`. Only ever observed through the status record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobFailure {
    #[error("interrupted before report generation started")]
    Interrupted,
    #[error("build {0} not found during report generation")]
    NotFoundDuringGeneration(BuildId),
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
    #[error("failed to write report: {0}")]
    Io(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
    /// Submission was rejected and an operator gave up on the task.
    #[error("abandoned: {0}")]
    Abandoned(String),
}

impl JobFailure {
    /// Short category label for logs.
    pub fn category(&self) -> &'static str {
        match self {
            JobFailure::Interrupted => "interrupted",
            JobFailure::NotFoundDuringGeneration(_) => "not_found",
            JobFailure::DataUnavailable(_) => "data_unavailable",
            JobFailure::Io(_) => "io",
            JobFailure::Unexpected(_) => "unexpected",
            JobFailure::Abandoned(_) => "abandoned",
        }
    }
}

impl From<DataError> for JobFailure {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Unavailable(msg) => JobFailure::DataUnavailable(msg),
            DataError::Storage(msg) => JobFailure::Unexpected(format!("storage error: {}", msg)),
        }
    }
}
