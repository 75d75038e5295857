//! Fixed-size worker pool with a bounded queue.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Unit of work run on a pool thread. Receives the pool's interrupt signal.
pub type PoolJob = Box<dyn FnOnce(&Interrupt) + Send + 'static>;

/// Submission refused by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("worker queue is full")]
    Saturated,
    #[error("worker pool is shutting down")]
    ShuttingDown,
}

/// Returned by `Interrupt::sleep` when the wait was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("interrupted")]
pub struct Interrupted;

/// Cooperative interrupt flag shared by every thread of a pool.
///
/// Once raised it stays raised; jobs observe it only where they choose to
/// call `sleep` or `is_interrupted`.
#[derive(Debug, Default)]
pub struct Interrupt {
    raised: Mutex<bool>,
    signal: Condvar,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        let mut raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        *raised = true;
        self.signal.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        *self.raised.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for `duration`, returning early with `Interrupted` if the flag is
    /// (or becomes) raised. A zero duration only checks the flag.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let deadline = Instant::now() + duration;
        let mut raised = self.raised.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *raised {
                return Err(Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let (guard, _) = self
                .signal
                .wait_timeout(raised, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            raised = guard;
        }
    }
}

/// Pool of named worker threads fed through a bounded channel.
///
/// - `submit` never blocks: a full queue is `Saturated`
/// - `shutdown` stops intake, lets queued jobs run, joins the threads
/// - `shutdown_now` also raises the interrupt first
///
/// Dropping the pool stops intake without joining.
#[derive(Debug)]
pub struct WorkerPool {
    name: String,
    sender: Mutex<Option<SyncSender<PoolJob>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    interrupt: Arc<Interrupt>,
}

impl WorkerPool {
    /// Spawn `workers` threads sharing a queue of `queue_capacity` pending
    /// jobs. Both are raised to at least one: a zero-capacity channel only
    /// accepts a job while a worker is already parked in `recv`.
    pub fn new(name: impl Into<String>, workers: usize, queue_capacity: usize) -> std::io::Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::sync_channel::<PoolJob>(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let interrupt = Arc::new(Interrupt::new());

        let mut handles = Vec::with_capacity(workers.max(1));
        for index in 0..workers.max(1) {
            let thread_name = format!("{}-{}", name, index);
            let receiver = Arc::clone(&receiver);
            let interrupt = Arc::clone(&interrupt);
            let worker_name = thread_name.clone();
            let handle = thread::Builder::new()
                .name(thread_name)
                .spawn(move || worker_loop(&worker_name, &receiver, &interrupt))?;
            handles.push(handle);
        }

        info!(
            pool = %name,
            workers = handles.len(),
            queue_capacity = queue_capacity.max(1),
            "worker pool started"
        );

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
            interrupt,
        })
    }

    pub fn submit(&self, job: PoolJob) -> Result<(), SubmitError> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            return Err(SubmitError::ShuttingDown);
        };
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SubmitError::Saturated),
            Err(TrySendError::Disconnected(_)) => Err(SubmitError::ShuttingDown),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stop accepting jobs, drain the queue and join every worker.
    pub fn shutdown(&self) {
        self.close();
        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!(pool = %self.name, "worker thread panicked");
            }
        }
        info!(pool = %self.name, "worker pool stopped");
    }

    /// Raise the interrupt, then `shutdown`. Jobs still waiting at their
    /// interrupt point (or still queued) observe the interrupt.
    pub fn shutdown_now(&self) {
        self.interrupt.raise();
        self.shutdown();
    }

    fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(name: &str, receiver: &Mutex<Receiver<PoolJob>>, interrupt: &Interrupt) {
    debug!(worker = name, "worker started");
    loop {
        // The guard is dropped before the job runs.
        let next = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(job) = next else {
            break;
        };

        // A panicking job must not take the worker thread down with it.
        if panic::catch_unwind(AssertUnwindSafe(|| job(interrupt))).is_err() {
            warn!(worker = name, "job panicked");
        }
    }
    debug!(worker = name, "worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn runs_submitted_jobs() {
        let pool = WorkerPool::new("test-pool", 2, 8).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            pool.submit(Box::new(move |_: &Interrupt| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn full_queue_is_saturated() {
        let pool = WorkerPool::new("test-pool", 1, 1).unwrap();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        // Occupy the only worker.
        pool.submit(Box::new(move |_: &Interrupt| {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        }))
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // Fills the queue.
        pool.submit(Box::new(|_: &Interrupt| {})).unwrap();
        assert_eq!(pool.submit(Box::new(|_: &Interrupt| {})), Err(SubmitError::Saturated));

        release_tx.send(()).unwrap();
        pool.shutdown();
    }

    #[test]
    fn zero_capacity_still_accepts_on_idle_pool() {
        let pool = WorkerPool::new("test-pool", 2, 0).unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..20 {
            let tx = tx.clone();
            pool.submit(Box::new(move |_: &Interrupt| {
                let _ = tx.send(i);
            }))
            .unwrap();
            assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), i);
        }
        pool.shutdown();
    }

    #[test]
    fn rejects_after_shutdown() {
        let pool = WorkerPool::new("test-pool", 1, 4).unwrap();
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert_eq!(pool.submit(Box::new(|_: &Interrupt| {})), Err(SubmitError::ShuttingDown));
    }

    #[test]
    fn shutdown_now_wakes_sleeping_jobs() {
        let pool = WorkerPool::new("test-pool", 1, 4).unwrap();
        let (result_tx, result_rx) = mpsc::channel();
        let (started_tx, started_rx) = mpsc::channel::<()>();

        pool.submit(Box::new(move |interrupt: &Interrupt| {
            let _ = started_tx.send(());
            let _ = result_tx.send(interrupt.sleep(Duration::from_secs(30)));
        }))
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let begin = Instant::now();
        pool.shutdown_now();
        assert!(begin.elapsed() < Duration::from_secs(10));
        assert_eq!(result_rx.recv().unwrap(), Err(Interrupted));
    }

    #[test]
    fn panicking_job_keeps_worker_alive() {
        let pool = WorkerPool::new("test-pool", 1, 4).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.submit(Box::new(|_: &Interrupt| panic!("boom"))).unwrap();
        pool.submit(Box::new(move |_: &Interrupt| {
            let _ = tx.send(42);
        }))
        .unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        pool.shutdown();
    }

    #[test]
    fn zero_sleep_only_checks_flag() {
        let interrupt = Interrupt::new();
        assert_eq!(interrupt.sleep(Duration::ZERO), Ok(()));
        interrupt.raise();
        assert!(interrupt.is_interrupted());
        assert_eq!(interrupt.sleep(Duration::ZERO), Err(Interrupted));
    }
}
