//! `buildvault <seed.json> <identifier>...`
//!
//! Seeds an in-memory catalog, starts one report job per identifier, polls
//! every task to a terminal state and prints the statuses as JSON lines.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{error, info};

use buildvault_cache::InMemoryKeyedStore;
use buildvault_catalog::{Build, BuildCatalog, InMemoryBuildRepository};
use buildvault_core::TaskId;
use buildvault_jobs::{AsyncJobRunner, JobRunnerConfig, TaskStatus};
use buildvault_observability::RequestCounter;

const USAGE: &str = "usage: buildvault <seed.json> <identifier>...";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    buildvault_observability::init();

    let mut args = std::env::args().skip(1);
    let Some(seed_path) = args.next() else {
        bail!(USAGE);
    };
    let identifiers: Vec<String> = args.collect();
    if identifiers.is_empty() {
        bail!(USAGE);
    }

    let config = JobRunnerConfig::from_env()?;
    info!(log_dir = %config.log_dir.display(), workers = config.workers, "starting");

    let seed = fs::read_to_string(&seed_path)
        .with_context(|| format!("failed to read seed file {}", seed_path))?;
    let builds: Vec<Build> =
        serde_json::from_str(&seed).with_context(|| format!("invalid seed file {}", seed_path))?;

    let repository = InMemoryBuildRepository::arc();
    let cache = InMemoryKeyedStore::arc();
    let requests = RequestCounter::new();
    let catalog = BuildCatalog::new(Arc::clone(&repository), Arc::clone(&cache), requests.clone());
    for build in builds {
        catalog.save(build)?;
    }
    info!(builds = catalog.list_all().len(), "catalog seeded");

    let runner = AsyncJobRunner::new(config, repository, cache)?;
    let mut tasks = Vec::with_capacity(identifiers.len());
    for identifier in &identifiers {
        match runner.initiate(identifier) {
            Ok(task_id) => tasks.push(task_id),
            Err(e) => error!(identifier = %identifier, error = %e, "could not start report job"),
        }
    }

    let statuses = tasks
        .into_iter()
        .map(|task_id| wait_for_terminal(&runner, task_id))
        .collect::<Result<Vec<_>>>()?;
    runner.shutdown();

    for status in &statuses {
        let elapsed = status.updated_at() - status.created_at();
        info!(
            task_id = %status.task_id(),
            state = ?status.state(),
            elapsed_ms = elapsed.num_milliseconds(),
            "task finished"
        );
        println!("{}", serde_json::to_string(status)?);
    }
    info!(requests = requests.snapshot().total, "done");
    Ok(())
}

fn wait_for_terminal(
    runner: &AsyncJobRunner<Arc<InMemoryBuildRepository>, Arc<InMemoryKeyedStore>>,
    task_id: TaskId,
) -> Result<TaskStatus> {
    loop {
        let status = runner
            .get_status(task_id)
            .with_context(|| format!("status of task {} disappeared", task_id))?;
        if status.is_terminal() {
            return Ok(status);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
