//! A fixed-size pool of worker threads fed by a single dispatcher.
//!
//! Submitters push tasks onto an unbounded FIFO queue. The dispatcher
//! thread takes them off in order and hands each to the first idle worker,
//! so tasks start in the order they were scheduled. [`ThreadPool::wait`]
//! blocks until the queue is empty and no worker is busy.

mod builder;
mod dispatcher;
mod pool;
mod queue;
mod worker;

pub use self::builder::Builder;
pub use self::pool::{PoolState, PoolStats, ThreadPool};

/// A unit of work owned by the pool from `schedule` until it has run.
pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;
