//! Report job submission and execution.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use buildvault_cache::KeyedStore;
use buildvault_catalog::{BuildRef, BuildSource, DataError};
use buildvault_core::{BuildId, TaskId};

use crate::artifact::{ArtifactStore, FsArtifactStore};
use crate::config::{ConfigError, JobRunnerConfig};
use crate::pool::{Interrupt, PoolJob, SubmitError, WorkerPool};
use crate::report::render_report;
use crate::status::TaskStatusStore;
use crate::types::{InvalidTransition, JobFailure, TaskStatus};

/// Synchronous failures of the job API. Anything that goes wrong after a
/// job is handed to the pool is a `JobFailure` on the status record instead.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("build not found: {0}")]
    NotFound(String),
    #[error("lookup failed: {0}")]
    Lookup(#[from] DataError),
    /// The PENDING record of `task_id` was written but no worker will ever
    /// pick it up. See `AsyncJobRunner::abandon`.
    #[error("submission of task {task_id} rejected: {source}")]
    SubmissionRejected { task_id: TaskId, source: SubmitError },
    #[error("unknown task {0}")]
    UnknownTask(TaskId),
    #[error("task {0} was not rejected at submission and cannot be abandoned")]
    NotAbandonable(TaskId),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("failed to start worker pool: {0}")]
    Startup(#[source] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Work executed on a pool thread for one task.
///
/// Implementations own the terminal status write and must not panic out or
/// return errors: there is no caller left to receive them.
pub trait JobWorker: Send + Sync + 'static {
    fn perform(&self, target: BuildRef, task_id: TaskId, interrupt: &Interrupt);
}

/// Renders a build report and records the outcome of the task.
pub struct ReportWorker<B, S> {
    source: B,
    statuses: TaskStatusStore<S>,
    artifacts: Arc<dyn ArtifactStore>,
    start_delay: Duration,
}

impl<B, S> ReportWorker<B, S>
where
    B: BuildSource,
    S: KeyedStore,
{
    pub fn new(
        source: B,
        statuses: TaskStatusStore<S>,
        artifacts: Arc<dyn ArtifactStore>,
        start_delay: Duration,
    ) -> Self {
        Self {
            source,
            statuses,
            artifacts,
            start_delay,
        }
    }

    fn generate(&self, build_id: BuildId) -> Result<PathBuf, JobFailure> {
        let build = self
            .source
            .load_full(build_id)?
            .ok_or(JobFailure::NotFoundDuringGeneration(build_id))?;
        let report = render_report(&build, Utc::now());
        self.artifacts
            .write(build_id, &report)
            .map_err(|e| JobFailure::Io(e.to_string()))
    }

    fn finish(&self, task_id: TaskId, build_id: BuildId, outcome: Result<PathBuf, JobFailure>) {
        // The PENDING record may have been dropped by a cache clear.
        let current = self
            .statuses
            .get(task_id)
            .unwrap_or_else(|| TaskStatus::pending(task_id, build_id));

        let transition = match &outcome {
            Ok(path) => current.complete(path.clone()),
            Err(failure) => current.fail(failure.to_string()),
        };

        match transition {
            Ok(status) => {
                self.statuses.put(status);
                match outcome {
                    Ok(path) => info!(
                        task_id = %task_id,
                        build_id = %build_id,
                        artifact = %path.display(),
                        "report job completed"
                    ),
                    Err(failure) => warn!(
                        task_id = %task_id,
                        build_id = %build_id,
                        category = failure.category(),
                        error = %failure,
                        "report job failed"
                    ),
                }
            }
            Err(e) => error!(task_id = %task_id, error = %e, "terminal status already written"),
        }
    }
}

impl<B, S> JobWorker for ReportWorker<B, S>
where
    B: BuildSource + 'static,
    S: KeyedStore + 'static,
{
    fn perform(&self, target: BuildRef, task_id: TaskId, interrupt: &Interrupt) {
        debug!(task_id = %task_id, build_id = %target.id, "report job picked up");

        let outcome = match interrupt.sleep(self.start_delay) {
            Err(_) => Err(JobFailure::Interrupted),
            Ok(()) => panic::catch_unwind(AssertUnwindSafe(|| self.generate(target.id)))
                .unwrap_or_else(|payload| Err(JobFailure::Unexpected(panic_message(&*payload)))),
        };

        self.finish(task_id, target.id, outcome);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic during report generation".to_string()
    }
}

/// Caller-side half of a job: resolve, record PENDING, hand off.
pub struct Submitter<B, S> {
    source: B,
    statuses: TaskStatusStore<S>,
    pool: WorkerPool,
    worker: Arc<dyn JobWorker>,
    rejected: Mutex<HashSet<TaskId>>,
}

impl<B, S> Submitter<B, S>
where
    B: BuildSource,
    S: KeyedStore,
{
    pub fn new(
        source: B,
        statuses: TaskStatusStore<S>,
        pool: WorkerPool,
        worker: Arc<dyn JobWorker>,
    ) -> Self {
        Self {
            source,
            statuses,
            pool,
            worker,
            rejected: Mutex::new(HashSet::new()),
        }
    }

    /// Start a job for `identifier` and return its task id without waiting.
    ///
    /// The PENDING record is written before the job reaches the pool, so a
    /// status read right after this returns never comes back empty.
    pub fn initiate(&self, identifier: &str) -> Result<TaskId, JobError> {
        let target = self
            .source
            .lookup(identifier)?
            .ok_or_else(|| JobError::NotFound(identifier.to_string()))?;

        let task_id = TaskId::new();
        let build_id = target.id;
        self.statuses.put(TaskStatus::pending(task_id, build_id));
        debug!(task_id = %task_id, build_id = %build_id, "task pending");

        let worker = Arc::clone(&self.worker);
        let job: PoolJob =
            Box::new(move |interrupt: &Interrupt| worker.perform(target, task_id, interrupt));

        match self.pool.submit(job) {
            Ok(()) => {
                info!(task_id = %task_id, build_id = %build_id, "report job submitted");
                Ok(task_id)
            }
            Err(source) => {
                self.rejected
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(task_id);
                warn!(
                    task_id = %task_id,
                    build_id = %build_id,
                    error = %source,
                    "submission rejected; PENDING record left without a worker"
                );
                Err(JobError::SubmissionRejected { task_id, source })
            }
        }
    }

    fn take_rejected(&self, task_id: TaskId) -> bool {
        self.rejected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&task_id)
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

/// Entry point for background report jobs.
///
/// `initiate` returns a task id; progress is read back with `get_status`.
pub struct AsyncJobRunner<B, S> {
    submitter: Submitter<B, S>,
    statuses: TaskStatusStore<S>,
}

impl<B, S> AsyncJobRunner<B, S>
where
    B: BuildSource + Clone + 'static,
    S: KeyedStore + Clone + 'static,
{
    /// Runner writing artifacts under `config.log_dir`.
    pub fn new(config: JobRunnerConfig, source: B, cache: S) -> Result<Self, JobError> {
        let artifacts = Arc::new(FsArtifactStore::new(config.log_dir.clone()));
        Self::with_artifact_store(config, source, cache, artifacts)
    }

    pub fn with_artifact_store(
        config: JobRunnerConfig,
        source: B,
        cache: S,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Result<Self, JobError> {
        config.validate()?;
        let statuses = TaskStatusStore::new(cache);
        let worker = Arc::new(ReportWorker::new(
            source.clone(),
            statuses.clone(),
            artifacts,
            config.start_delay,
        ));
        let pool = WorkerPool::new(config.name.clone(), config.workers, config.queue_capacity)
            .map_err(JobError::Startup)?;

        Ok(Self {
            submitter: Submitter::new(source, statuses.clone(), pool, worker),
            statuses,
        })
    }

    pub fn initiate(&self, identifier: &str) -> Result<TaskId, JobError> {
        self.submitter.initiate(identifier)
    }

    pub fn get_status(&self, task_id: TaskId) -> Option<TaskStatus> {
        self.statuses.get(task_id)
    }

    /// Move a task whose submission was rejected from PENDING to FAILED.
    ///
    /// Only tasks this runner saw rejected qualify; a task a worker owns is
    /// refused with `NotAbandonable`.
    pub fn abandon(&self, task_id: TaskId) -> Result<TaskStatus, JobError> {
        if !self.submitter.take_rejected(task_id) {
            return Err(match self.statuses.get(task_id) {
                Some(_) => JobError::NotAbandonable(task_id),
                None => JobError::UnknownTask(task_id),
            });
        }
        let status = self
            .statuses
            .get(task_id)
            .ok_or(JobError::UnknownTask(task_id))?;
        let failed = status
            .fail(JobFailure::Abandoned("submission was rejected".to_string()).to_string())?;
        self.statuses.put(failed.clone());
        info!(task_id = %task_id, "abandoned task");
        Ok(failed)
    }

    /// Stop intake and wait for queued and running jobs.
    pub fn shutdown(&self) {
        self.submitter.pool().shutdown();
    }

    /// Like `shutdown`, but jobs still at their start delay fail as interrupted.
    pub fn shutdown_now(&self) {
        self.submitter.pool().shutdown_now();
    }
}
