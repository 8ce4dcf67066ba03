use super::core::{ExecutorCore, Handle};
use super::{run_task, Executor, Message, Worker};
use crate::error::{ErrorKind, Result};
use crate::logging::null_logger;
use crossbeam::channel::{unbounded, Receiver, Sender};
use slog::Logger;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Executor for statically partitioned work.
///
/// Every worker owns a private queue and runs whatever lands in it, in
/// submission order. `execute` routes round-robin over the queue index; the
/// caller's partitioning decides which tasks share a worker, so there is no
/// ordering guarantee across different queues.
pub struct StaticExecutor {
    core: Arc<ExecutorCore>,
    senders: Vec<Sender<Message>>,
    workers: Vec<Worker>,
    next_queue: AtomicUsize,
}

impl StaticExecutor {
    pub fn with_logger(num_threads: usize, logger: Logger) -> Result<StaticExecutor> {
        let core = Arc::new(ExecutorCore::new(num_threads, logger)?);

        let mut senders = Vec::with_capacity(num_threads);
        let mut workers = Vec::with_capacity(num_threads);
        for id in 0..num_threads {
            let (sender, receiver) = unbounded::<Message>();
            let shared = Arc::clone(&core);
            workers.push(Worker::spawn(id, Arc::clone(&core), move || {
                accept_loop(id, receiver, shared)
            }));
            senders.push(sender);
        }

        Ok(StaticExecutor {
            core,
            senders,
            workers,
            next_queue: AtomicUsize::new(0),
        })
    }
}

impl std::fmt::Debug for StaticExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticExecutor")
            .field("num_threads", &self.core.num_threads())
            .finish_non_exhaustive()
    }
}

impl Executor for StaticExecutor {
    fn new(num_threads: usize) -> Result<Self> {
        StaticExecutor::with_logger(num_threads, null_logger())
    }

    fn execute<F>(&self, task: F) -> Result<()>
    where
        F: Send + FnOnce() + 'static,
    {
        if self.core.is_terminating() {
            return Err(ErrorKind::Rejected(
                "task rejected: the executor is already draining".to_string(),
            )
            .into());
        }

        // route by the configured pool size, round-robin over the queues
        let index = self.next_queue.fetch_add(1, Ordering::Relaxed) % self.core.num_threads();
        self.senders[index].send(Message::Work(Box::new(task)))?;
        Ok(())
    }

    fn wait_for_execution(&mut self) -> Result<()> {
        if let Some(id) = self.core.worker_id_of_current() {
            return Err(ErrorKind::Misuse(format!(
                "wait_for_execution called from worker thread {}; it would join itself",
                id
            ))
            .into());
        }
        if !self.core.begin_termination() {
            return Err(
                ErrorKind::Misuse("wait_for_execution called more than once".to_string()).into(),
            );
        }

        // the sentinel lands behind everything already queued, so each
        // worker finishes its own backlog before it sees the stop sign
        for sender in &self.senders {
            sender.send(Message::Terminate)?;
        }
        for worker in &mut self.workers {
            worker.join(self.core.logger());
        }
        Ok(())
    }

    fn thread_num(&self) -> usize {
        self.core.thread_num()
    }

    fn num_threads(&self) -> usize {
        self.core.num_threads()
    }

    fn hit_barrier(&self, name: &str) {
        self.core.hit_barrier(name);
    }

    fn handle(&self) -> Handle {
        Handle::new(Arc::clone(&self.core))
    }
}

// The channel is the queue and the condition in one: recv suspends the
// worker while its queue is empty and hands back tasks in submission order.
fn accept_loop(id: usize, receiver: Receiver<Message>, core: Arc<ExecutorCore>) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Work(task) => run_task(id, task, core.logger()),
            Message::Terminate => break,
        }
    }
}
