//! Fixed-size worker pools for fork-join parallel regions.
//!
//! Two scheduling engines share one contract: `StaticExecutor` binds a
//! private task queue to every worker and routes work at submission time,
//! while `DynamicExecutor` lets the first free worker take the next task
//! from a shared queue. Named barriers let the whole cohort of workers
//! rendezvous in the middle of a run.

pub mod barrier;
pub mod error;
pub mod executor;
pub mod logging;
