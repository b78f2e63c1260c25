#![deny(missing_docs)]

//! A fixed-size thread pool with FIFO dispatch and drain-wait.
//!
//! This library runs zero-argument closures on a bounded set of
//! long-lived worker threads. A dedicated dispatcher thread assigns
//! queued tasks to idle workers in submission order, callers can block
//! until all submitted work has finished, and dropping the pool drains
//! it before joining every thread.

mod error;
pub mod thread_pool;

pub use error::{PoolError, Result};
pub use thread_pool::{Builder, PoolState, PoolStats, ThreadPool};
