use std::io;
use thiserror::Error;

/// Error type for thread pool operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// A pool must have at least one worker thread.
    #[error("Invalid pool size: at least one worker thread is required")]
    InvalidSize,

    /// The OS refused to start a pool thread.
    #[error("Failed to spawn pool thread: {0}")]
    Spawn(#[from] io::Error),

    /// A task was scheduled after shutdown had begun.
    #[error("Thread pool is shut down")]
    ShutDown,

    /// A pool thread panicked outside of a task and could not be joined cleanly.
    #[error("Pool thread {0} panicked")]
    ThreadPanicked(String),
}

/// Result type alias for thread pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
