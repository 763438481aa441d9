//! Worker pool for solve attempts.
//!
//! Jobs run on a fixed-size rayon pool. Each job owns its inputs and hands
//! its result back through a one-shot channel; the caller polls the handle
//! without blocking. A job that panics drops its sender, which the handle
//! reports as [`TaskPoll::Lost`].

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error};

use crate::error::{Result, SymcircError};

/// Fixed-size pool of solver workers.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Start a pool with `workers` threads (at least one).
    pub fn new(workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("symcirc-worker-{}", i))
            .panic_handler(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(message = %message, "solver worker panicked");
            })
            .build()
            .map_err(|e| SymcircError::WorkerPool {
                message: e.to_string(),
            })?;
        debug!(workers = pool.current_num_threads(), "worker pool started");
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` on the pool.
    pub fn submit<T, F>(&self, label: impl Into<String>, job: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let label = label.into();
        debug!(task = %label, "submitted");
        self.pool.spawn(move || {
            // the receiver may already be gone if the result was superseded
            let _ = sender.send(job());
        });
        TaskHandle {
            label,
            receiver,
            started: Instant::now(),
        }
    }
}

/// State of a submitted job.
#[derive(Debug)]
pub enum TaskPoll<T> {
    Ready(T),
    Pending,
    /// The job ended without sending a result.
    Lost,
}

/// Handle to a job submitted to a [`WorkerPool`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    label: String,
    receiver: Receiver<T>,
    started: Instant,
}

impl<T> TaskHandle<T> {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Check for a result without blocking.
    pub fn poll(&self) -> TaskPoll<T> {
        match self.receiver.try_recv() {
            Ok(value) => TaskPoll::Ready(value),
            Err(TryRecvError::Empty) => TaskPoll::Pending,
            Err(TryRecvError::Disconnected) => TaskPoll::Lost,
        }
    }

    /// Time since submission.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait<T>(handle: &TaskHandle<T>) -> TaskPoll<T> {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            match handle.poll() {
                TaskPoll::Pending if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(1))
                }
                other => return other,
            }
        }
    }

    #[test]
    fn test_result_arrives() {
        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.submit("sum", || (1..=10).sum::<i32>());
        assert_eq!(handle.label(), "sum");
        assert!(matches!(wait(&handle), TaskPoll::Ready(55)));
    }

    #[test]
    fn test_panic_is_lost() {
        let pool = WorkerPool::new(1).unwrap();
        let handle = pool.submit("boom", || -> i32 { panic!("boom") });
        assert!(matches!(wait(&handle), TaskPoll::Lost));
        // the pool survives
        let handle = pool.submit("after", || 7);
        assert!(matches!(wait(&handle), TaskPoll::Ready(7)));
    }

    #[test]
    fn test_zero_workers_rounds_up() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.workers(), 1);
    }
}
