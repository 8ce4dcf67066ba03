use slog::{crit, Logger};
use std::collections::HashMap;
use std::process::exit;
use std::sync::{Arc, Barrier, RwLock};

/// Named rendezvous points shared by every worker of one pool.
///
/// A barrier is created lazily by whichever thread hits its name first and
/// is sized to the full worker count. Barriers are cyclic: the same name can
/// be hit again on the next generation of a loop and every participant must
/// arrive before any is released.
pub struct BarrierRegistry {
    participants: usize,
    barriers: RwLock<HashMap<String, Arc<Barrier>>>,
    logger: Logger,
}

impl BarrierRegistry {
    pub fn new(participants: usize, logger: Logger) -> BarrierRegistry {
        BarrierRegistry {
            participants,
            barriers: RwLock::new(HashMap::new()),
            logger,
        }
    }

    /// Block until all participants have hit `name`, then release them
    /// together.
    pub fn hit(&self, name: &str) {
        self.get_or_create(name).wait();
    }

    fn get_or_create(&self, name: &str) -> Arc<Barrier> {
        // fast path: the barrier was already published by an earlier hit
        {
            let barriers = match self.barriers.read() {
                Ok(guard) => guard,
                Err(_) => self.broken(name),
            };
            if let Some(barrier) = barriers.get(name) {
                return Arc::clone(barrier);
            }
        }

        // first hit of this name: the entry call is a single atomic
        // get-or-create, so two racing first arrivals still end up
        // waiting on the same barrier
        let mut barriers = match self.barriers.write() {
            Ok(guard) => guard,
            Err(_) => self.broken(name),
        };
        let barrier = barriers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Barrier::new(self.participants)));
        Arc::clone(barrier)
    }

    // A poisoned registry means a participant died while touching it. A
    // barrier missing one participant can never release the others, so the
    // whole process stops here.
    fn broken(&self, name: &str) -> ! {
        eprintln!(
            "an error occurred while processing barrier '{}': a thread died outside \
             the pool's own shutdown path. Please do not manipulate threads owned by \
             the executors.",
            name
        );
        crit!(self.logger, "barrier registry is broken"; "barrier" => name);
        exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::o;
    use std::thread;

    fn registry(participants: usize) -> BarrierRegistry {
        BarrierRegistry::new(participants, Logger::root(slog::Discard, o!()))
    }

    #[test]
    fn same_name_yields_same_barrier() {
        let registry = registry(2);
        let first = registry.get_or_create("loop");
        let second = registry.get_or_create("loop");
        assert!(Arc::ptr_eq(&first, &second));

        let other = registry.get_or_create("other");
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn concurrent_first_hit_releases_everyone() {
        let registry = Arc::new(registry(4));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                // two generations over the same name
                registry.hit("race");
                registry.hit("race");
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
