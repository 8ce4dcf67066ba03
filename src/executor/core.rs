use crate::barrier::BarrierRegistry;
use crate::error::{ErrorKind, Result};
use slog::{crit, Logger};
use std::collections::HashMap;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, ThreadId};

/// State shared by the submitter and every worker of either engine: the
/// fixed pool size, the thread-id registry, the named barriers and the
/// termination flag.
pub(crate) struct ExecutorCore {
    num_threads: usize,
    barriers: BarrierRegistry,
    // native thread -> logical id, written once per worker at spawn
    ids: RwLock<HashMap<ThreadId, usize>>,
    terminating: AtomicBool,
    logger: Logger,
}

impl ExecutorCore {
    pub(crate) fn new(num_threads: usize, logger: Logger) -> Result<ExecutorCore> {
        if num_threads == 0 {
            return Err(ErrorKind::InvalidPoolSize(
                "number of threads must be a positive integer".to_string(),
            )
            .into());
        }

        Ok(ExecutorCore {
            num_threads,
            barriers: BarrierRegistry::new(num_threads, logger.clone()),
            ids: RwLock::new(HashMap::with_capacity(num_threads)),
            terminating: AtomicBool::new(false),
            logger,
        })
    }

    pub(crate) fn num_threads(&self) -> usize {
        self.num_threads
    }

    // The id is assigned at spawn and recorded per native thread. Deriving
    // it from an OS handle number instead is not stable or collision-free
    // once the pool grows.
    pub(crate) fn register_worker(&self, id: usize) {
        let mut ids = match self.ids.write() {
            Ok(guard) => guard,
            Err(_) => self.registry_broken(),
        };
        ids.insert(thread::current().id(), id);
    }

    pub(crate) fn worker_id_of_current(&self) -> Option<usize> {
        let ids = match self.ids.read() {
            Ok(guard) => guard,
            Err(_) => self.registry_broken(),
        };
        ids.get(&thread::current().id()).copied()
    }

    /// Stable id of the calling thread. The submitting thread is not in the
    /// registry and observes 0 by convention.
    pub(crate) fn thread_num(&self) -> usize {
        self.worker_id_of_current().unwrap_or(0)
    }

    pub(crate) fn hit_barrier(&self, name: &str) {
        self.barriers.hit(name);
    }

    /// Flip the termination flag. Returns false if draining had already
    /// begun, which makes the second caller a usage error.
    pub(crate) fn begin_termination(&self) -> bool {
        !self.terminating.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    pub(crate) fn logger(&self) -> &Logger {
        &self.logger
    }

    fn registry_broken(&self) -> ! {
        eprintln!(
            "the thread-id registry is broken: a thread died outside the pool's own \
             shutdown path. Please do not manipulate threads owned by the executors."
        );
        crit!(self.logger, "thread-id registry is broken");
        exit(1);
    }
}

/// Cloneable view of a pool for use from inside tasks.
///
/// Tasks are `'static` and cannot borrow the executor they run on, so the
/// generated code captures one of these instead.
#[derive(Clone)]
pub struct Handle {
    core: Arc<ExecutorCore>,
}

impl Handle {
    pub(crate) fn new(core: Arc<ExecutorCore>) -> Handle {
        Handle { core }
    }

    pub fn thread_num(&self) -> usize {
        self.core.thread_num()
    }

    pub fn num_threads(&self) -> usize {
        self.core.num_threads()
    }

    pub fn hit_barrier(&self, name: &str) {
        self.core.hit_barrier(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::null_logger;

    #[test]
    fn zero_threads_is_rejected() {
        assert!(ExecutorCore::new(0, null_logger()).is_err());
    }

    #[test]
    fn unregistered_thread_observes_zero() {
        let core = ExecutorCore::new(4, null_logger()).unwrap();
        assert_eq!(core.thread_num(), 0);
        assert_eq!(core.worker_id_of_current(), None);
    }

    #[test]
    fn registered_worker_observes_its_id() {
        let core = Arc::new(ExecutorCore::new(4, null_logger()).unwrap());
        let shared = Arc::clone(&core);
        let observed = thread::spawn(move || {
            shared.register_worker(3);
            shared.thread_num()
        })
        .join()
        .unwrap();
        assert_eq!(observed, 3);
        // the registration belongs to the spawned thread, not this one
        assert_eq!(core.thread_num(), 0);
    }

    #[test]
    fn termination_begins_once() {
        let core = ExecutorCore::new(1, null_logger()).unwrap();
        assert!(!core.is_terminating());
        assert!(core.begin_termination());
        assert!(!core.begin_termination());
        assert!(core.is_terminating());
    }
}
