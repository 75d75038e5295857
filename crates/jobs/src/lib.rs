//! Background report jobs tracked through the keyed store.
//!
//! ## Design
//!
//! - `initiate` validates the target, writes a PENDING status, then hands the
//!   work to a worker pool; it never waits for completion
//! - the assigned worker is the only writer of the terminal status
//!   (COMPLETED or FAILED), written exactly once
//! - status records live in the shared keyed store under the task namespace
//!   and are read back by polling
//!
//! ## Components
//!
//! - `TaskStatus` / `TaskState`: the record and its state machine
//! - `TaskStatusStore`: typed access to task records in a `KeyedStore`
//! - `WorkerPool`: fixed threads, bounded queue, cooperative interrupt
//! - `Submitter` / `ReportWorker`: the synchronous and pooled halves of a job
//! - `AsyncJobRunner`: wires the halves together for callers

pub mod artifact;
pub mod config;
pub mod pool;
pub mod report;
pub mod runner;
pub mod status;
pub mod types;

pub use artifact::{ArtifactStore, FsArtifactStore};
pub use config::{ConfigError, JobRunnerConfig};
pub use pool::{Interrupt, Interrupted, PoolJob, SubmitError, WorkerPool};
pub use report::render_report;
pub use runner::{AsyncJobRunner, JobError, JobWorker, ReportWorker, Submitter};
pub use status::TaskStatusStore;
pub use types::{InvalidTransition, JobFailure, TaskState, TaskStatus};
