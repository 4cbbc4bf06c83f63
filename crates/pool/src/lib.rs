//! Bounded worker pool for repository evidence search.
//!
//! ```text
//! caller ──run──▶ dispatcher ──Task──▶ worker[0..N] (own Scanner each)
//!                    ▲   │ FIFO queue (≤ queue_max)
//!                    └───┴── Finished / Exited events (supervisor)
//! ```
//!
//! [`WorkerPool`] is the pool itself; [`EvidencePool`] is what callers hold:
//! it keeps one live pool per configuration and falls back to an in-process
//! search when the pool cannot be used.

mod config;
mod error;
mod handler;
mod manager;
mod pool;

pub use config::PoolConfig;
pub use error::{PoolError, Result};
pub use handler::{
    AggregatorHandler, AggregatorHandlerFactory, HandlerFactory, Task, TaskHandler, TaskId,
};
pub use manager::EvidencePool;
pub use pool::{PoolStats, WorkerPool};
