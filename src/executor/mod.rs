use crate::error::Result;
use slog::{crit, debug, warn, Logger};
use std::panic::{self, AssertUnwindSafe};
use std::process::exit;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

mod core;
mod dynamic_pool;
mod static_pool;

pub use self::core::Handle;
pub use dynamic_pool::DynamicExecutor;
pub use static_pool::StaticExecutor;

use self::core::ExecutorCore;

/// Common contract of the scheduling engines.
///
/// Callers submit tasks with `execute`, then make exactly one call to
/// `wait_for_execution`, which drains every queue and joins every worker.
pub trait Executor {
    fn new(num_threads: usize) -> Result<Self>
    where
        Self: Sized;

    fn execute<F>(&self, task: F) -> Result<()>
    where
        // since the task runs in a worker thread, it must have static lifetime
        F: Send + FnOnce() + 'static;

    /// Block the caller until all submitted work has finished and every
    /// worker has exited. No further `execute` call is accepted once this
    /// has begun.
    fn wait_for_execution(&mut self) -> Result<()>;

    /// Stable id of the calling thread, in `[0, num_threads)`. A thread
    /// that is not one of the pool's workers observes 0.
    fn thread_num(&self) -> usize;

    /// The fixed pool size given at construction.
    fn num_threads(&self) -> usize;

    /// Block until all `num_threads` workers have hit `name`, then release
    /// them together. The barrier behind a name is reusable on the next
    /// generation of a loop.
    fn hit_barrier(&self, name: &str);

    /// A cloneable view of the pool for use from inside tasks, which cannot
    /// borrow the executor they run on.
    fn handle(&self) -> Handle;
}

pub type Task = Box<dyn Send + FnOnce() + 'static>;

pub enum Message {
    Work(Task),
    Terminate,
}

pub(crate) struct Worker {
    id: usize,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn<F>(id: usize, core: Arc<ExecutorCore>, accept_loop: F) -> Worker
    where
        F: Send + FnOnce() + 'static,
    {
        let thread = thread::spawn(move || {
            // the id must be on record before the first task can ask for it
            core.register_worker(id);
            debug!(core.logger(), "worker started"; "worker" => id);
            accept_loop();
            debug!(core.logger(), "worker exiting"; "worker" => id);
        });

        Worker {
            id,
            thread: Some(thread),
        }
    }

    // A worker thread can only die outside the runtime's own shutdown path;
    // a pool missing a worker can never line up a barrier again.
    pub(crate) fn join(&mut self, logger: &Logger) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                eprintln!(
                    "worker {} died outside the pool's own shutdown path. Please do \
                     not manipulate threads owned by the executors.",
                    self.id
                );
                crit!(logger, "worker died outside the shutdown path"; "worker" => self.id);
                exit(1);
            }
        }
    }
}

// A task's own failure is the caller's business; the worker moves on to the
// rest of its queue either way.
pub(crate) fn run_task(id: usize, task: Task, logger: &Logger) {
    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        warn!(logger, "task panicked"; "worker" => id);
    }
}
