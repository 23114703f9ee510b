//! Bounded worker pool for decision evaluation and store I/O.
//!
//! Jobs queue on a bounded channel and run on a fixed set of workers, so
//! store latency is confined to pool tasks and submission never blocks
//! the caller. Shutdown closes the queue, lets the workers drain what was
//! already accepted, then joins them.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Errors returned by [`TaskExecutor::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// The job queue is full; the submission is rejected rather than blocking
    #[error("executor queue is full")]
    QueueFull,
    /// The executor has been shut down
    #[error("executor is stopped")]
    Stopped,
}

/// Handle to a submitted job's result.
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Wait for the job to finish. `None` if the job panicked or never ran.
    pub async fn join(self) -> Option<T> {
        self.rx.await.ok()
    }
}

pub struct TaskExecutor {
    queue: Mutex<Option<mpsc::Sender<Job>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl TaskExecutor {
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(queue_depth);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let rx = Arc::clone(&rx);
            handles.push(tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    let Some(job) = job else { break };

                    // Each job runs in its own task so a panic is contained
                    // there instead of killing the worker
                    if tokio::spawn(job).await.is_err() {
                        error!(worker, "Job panicked");
                    }
                }
                debug!(worker, "Worker stopped");
            }));
        }

        info!(workers, queue_depth, "Task executor started");
        Self {
            queue: Mutex::new(Some(tx)),
            workers: tokio::sync::Mutex::new(handles),
        }
    }

    /// Queue a job without blocking. The returned handle resolves once the
    /// job has run on a worker.
    pub fn submit<T, F>(&self, job: F) -> Result<TaskHandle<T>, ExecutorError>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let sender = {
            let guard = self.queue.lock().expect("executor queue lock poisoned");
            guard.as_ref().cloned().ok_or(ExecutorError::Stopped)?
        };

        let (done_tx, done_rx) = oneshot::channel();
        let wrapped: Job = Box::pin(async move {
            let _ = done_tx.send(job.await);
        });

        sender.try_send(wrapped).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ExecutorError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ExecutorError::Stopped,
        })?;

        Ok(TaskHandle { rx: done_rx })
    }

    /// Drain-then-stop: refuse new submissions, finish everything already
    /// queued, join the workers. Safe to call more than once.
    pub async fn shutdown(&self) {
        {
            let mut guard = self.queue.lock().expect("executor queue lock poisoned");
            guard.take();
        }

        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }

        info!("Task executor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    #[tokio::test]
    async fn test_submit_runs_job_and_returns_result() {
        let executor = TaskExecutor::new(2, 16);
        let handle = executor.submit(async { 41 + 1 }).unwrap();
        assert_eq!(handle.join().await, Some(42));
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let executor = TaskExecutor::new(1, 1);
        let gate = Arc::new(Semaphore::new(0));

        // Nothing completes until the gate opens, so repeated submissions
        // must eventually hit the queue bound
        let mut rejected = false;
        for _ in 0..10 {
            let gate = Arc::clone(&gate);
            match executor.submit(async move {
                let _permit = gate.acquire().await;
            }) {
                Ok(_) => {}
                Err(ExecutorError::QueueFull) => {
                    rejected = true;
                    break;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(rejected);

        gate.add_permits(16);
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_jobs() {
        let executor = TaskExecutor::new(1, 16);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            executor
                .submit(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        executor.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let executor = TaskExecutor::new(1, 4);
        executor.shutdown().await;
        assert_eq!(
            executor.submit(async {}).map(|_| ()),
            Err(ExecutorError::Stopped)
        );
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_kill_worker() {
        let executor = TaskExecutor::new(1, 4);

        let bad = executor.submit(async { panic!("boom") }).unwrap();
        assert_eq!(bad.join().await, None);

        // The single worker must still be alive to run this
        let good = executor.submit(async { 7 }).unwrap();
        assert_eq!(good.join().await, Some(7));

        executor.shutdown().await;
    }
}
