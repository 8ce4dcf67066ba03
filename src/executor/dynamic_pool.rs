use super::core::{ExecutorCore, Handle};
use super::{run_task, Executor, Message, Worker};
use crate::error::{Error, ErrorKind, Result};
use crate::logging::null_logger;
use crossbeam::channel::{unbounded, Receiver, Sender};
use slog::Logger;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Executor for work of uneven or unknown size.
///
/// All workers pull from one shared queue, one task at a time, so a long
/// task on one worker never holds up tasks that another worker could take.
/// The only ordering guarantee is that each submitted task runs exactly
/// once.
pub struct DynamicExecutor {
    core: Arc<ExecutorCore>,
    sender: Sender<Message>,
    workers: Vec<Worker>,
    pending: Arc<PendingWork>,
}

/// Count of submitted-but-unfinished tasks, plus the rendezvous the
/// submitter parks on while the count is nonzero.
struct PendingWork {
    remaining: AtomicUsize,
    done_lock: Mutex<()>,
    all_done: Condvar,
}

impl PendingWork {
    fn new() -> PendingWork {
        PendingWork {
            remaining: AtomicUsize::new(0),
            done_lock: Mutex::new(()),
            all_done: Condvar::new(),
        }
    }

    // The increment must be visible before any worker can possibly finish
    // the task and decrement past zero; counting before sending gives the
    // channel that ordering for free.
    fn submit_one(&self) {
        self.remaining.fetch_add(1, Ordering::SeqCst);
    }

    fn finish_one(&self) {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
            // the lock round-trip means a submitter between its check and
            // its wait cannot miss this wakeup
            let _guard = self.done_lock.lock().expect("pending-count mutex poisoned");
            self.all_done.notify_all();
        }
    }

    fn wait_until_drained(&self) {
        let mut guard = self.done_lock.lock().expect("pending-count mutex poisoned");
        while self.remaining.load(Ordering::SeqCst) > 0 {
            guard = self
                .all_done
                .wait(guard)
                .expect("pending-count mutex poisoned");
        }
    }
}

impl DynamicExecutor {
    pub fn with_logger(num_threads: usize, logger: Logger) -> Result<DynamicExecutor> {
        let core = Arc::new(ExecutorCore::new(num_threads, logger)?);
        let pending = Arc::new(PendingWork::new());

        let (sender, receiver) = unbounded::<Message>();
        let mut workers = Vec::with_capacity(num_threads);
        for id in 0..num_threads {
            let receiver = receiver.clone();
            let shared = Arc::clone(&core);
            let pending = Arc::clone(&pending);
            workers.push(Worker::spawn(id, Arc::clone(&core), move || {
                accept_loop(id, receiver, shared, pending)
            }));
        }

        Ok(DynamicExecutor {
            core,
            sender,
            workers,
            pending,
        })
    }
}

impl std::fmt::Debug for DynamicExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicExecutor")
            .field("num_threads", &self.core.num_threads())
            .finish_non_exhaustive()
    }
}

impl Executor for DynamicExecutor {
    fn new(num_threads: usize) -> Result<Self> {
        DynamicExecutor::with_logger(num_threads, null_logger())
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

        self.pending.submit_one();
        match self.sender.send(Message::Work(Box::new(task))) {
            Ok(()) => Ok(()),
            Err(err) => {
                // the task never made it into the queue; undo the count so
                // a waiting submitter is not stranded
                self.pending.finish_one();
                Err(Error::from(err))
            }
        }
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

        self.pending.wait_until_drained();

        // the queue is empty and stays empty; every parked worker gets one
        // sentinel to fall out of recv on
        for _ in 0..self.core.num_threads() {
            self.sender.send(Message::Terminate)?;
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

fn accept_loop(
    id: usize,
    receiver: Receiver<Message>,
    core: Arc<ExecutorCore>,
    pending: Arc<PendingWork>,
) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Work(task) => {
                // one task per take keeps the load balancing fine-grained
                run_task(id, task, core.logger());
                pending.finish_one();
            }
            Message::Terminate => break,
        }
    }
}
