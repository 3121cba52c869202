//! Background task pool.
//!
//! A small set of dedicated worker threads ticking a shared `async-executor`.
//! The asset manager submits the off-thread phase of asynchronous loaders here and
//! polls the returned [`Task`] from its driving thread without ever blocking on it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_executor::{Executor, Task};

/// Default time an idle worker sleeps before checking the queue again.
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Worker threads running futures submitted with [`spawn`](Self::spawn).
///
/// # Example
///
/// ```ignore
/// use hoard_core::TaskPool;
///
/// let pool = TaskPool::new(1);
/// let mut task = pool.spawn(async { 42 });
///
/// // Later, from the driving loop:
/// if let Some(value) = TaskPool::try_take(&mut task) {
///     assert_eq!(value, 42);
/// }
/// ```
pub struct TaskPool {
    executor: Arc<Executor<'static>>,
    workers: Vec<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl TaskPool {
    /// Start `workers` threads with the default idle sleep.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is 0.
    pub fn new(workers: usize) -> Self {
        Self::with_idle_sleep(workers, DEFAULT_IDLE_SLEEP)
    }

    /// Start `workers` threads that sleep for `idle_sleep` whenever the queue is empty.
    ///
    /// # Panics
    ///
    /// Panics if `workers` is 0 or a thread cannot be spawned.
    pub fn with_idle_sleep(workers: usize, idle_sleep: Duration) -> Self {
        assert!(workers > 0, "TaskPool needs at least one worker");

        let executor: Arc<Executor<'static>> = Arc::new(Executor::new());
        let stop = Arc::new(AtomicBool::new(false));

        let workers: Vec<_> = (0..workers)
            .map(|index| {
                let executor = Arc::clone(&executor);
                let stop = Arc::clone(&stop);
                thread::Builder::new()
                    .name(format!("hoard-worker-{}", index))
                    .spawn(move || {
                        while !stop.load(Ordering::Relaxed) {
                            if !executor.try_tick() {
                                thread::sleep(idle_sleep);
                            }
                        }
                    })
                    .expect("failed to spawn hoard worker thread")
            })
            .collect();

        tracing::debug!("Started {} hoard worker(s)", workers.len());

        Self {
            executor,
            workers,
            stop,
        }
    }

    /// Submit a future to the workers.
    pub fn spawn<T>(&self, future: impl Future<Output = T> + Send + 'static) -> Task<T>
    where
        T: Send + 'static,
    {
        self.executor.spawn(future)
    }

    /// Take the output of `task` if it has finished, without blocking.
    ///
    /// A task must not be polled again after its output has been taken.
    pub fn try_take<T>(task: &mut Task<T>) -> Option<T> {
        if !task.is_finished() {
            return None;
        }
        futures_lite::future::block_on(futures_lite::future::poll_once(task))
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop the workers and join them.
    ///
    /// Futures still waiting in the queue never run.
    pub fn shutdown(mut self) {
        self.stop_workers();
    }

    fn stop_workers(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        self.stop.store(true, Ordering::Relaxed);
        for worker in self.workers.drain(..) {
            if let Err(panic) = worker.join() {
                tracing::error!("hoard worker panicked: {:?}", panic);
            }
        }
        tracing::debug!("hoard workers stopped");
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        // Workers notice the flag on their next tick; they are not joined here.
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn wait_for<T>(task: &mut Task<T>) -> T {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(value) = TaskPool::try_take(task) {
                return value;
            }
            assert!(Instant::now() < deadline, "task did not finish in time");
            thread::yield_now();
        }
    }

    #[test]
    fn test_worker_count() {
        assert_eq!(TaskPool::new(3).thread_count(), 3);
        assert_eq!(TaskPool::default().thread_count(), 1);
    }

    #[test]
    fn test_spawn_can_be_awaited() {
        let pool = TaskPool::new(1);
        assert_eq!(pollster::block_on(pool.spawn(async { "done" })), "done");
    }

    #[test]
    fn test_try_take_polls_without_blocking() {
        let pool = TaskPool::new(1);
        let (tx, rx) = std::sync::mpsc::channel::<()>();

        let mut task = pool.spawn(async move {
            // Held until the test releases it.
            let _ = rx.recv();
            7
        });

        assert!(TaskPool::try_take(&mut task).is_none());
        tx.send(()).unwrap();
        assert_eq!(wait_for(&mut task), 7);
    }

    #[test]
    fn test_tasks_run_concurrently_on_workers() {
        let pool = TaskPool::new(2);
        let mut squares: Vec<_> = (1..=5u64)
            .map(|n| pool.spawn(async move { n * n }))
            .collect();

        let total: u64 = squares.iter_mut().map(wait_for).sum();
        assert_eq!(total, 55);
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn test_zero_workers_panics() {
        TaskPool::new(0);
    }

    #[test]
    fn test_shutdown_joins_workers() {
        let pool = TaskPool::new(2);
        let mut task = pool.spawn(async { 1 });
        assert_eq!(wait_for(&mut task), 1);
        pool.shutdown();
    }
}
