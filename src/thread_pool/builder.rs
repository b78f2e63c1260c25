use super::ThreadPool;
use crate::Result;

const DEFAULT_NAME: &str = "dispatch-pool";

/// A builder for constructing a customized [`ThreadPool`].
///
/// ```
/// use dispatch_pool::ThreadPool;
///
/// let pool = ThreadPool::builder()
///     .threads(2)
///     .thread_name("io")
///     .build()?;
/// assert_eq!(pool.threads(), 2);
/// # Ok::<(), dispatch_pool::PoolError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    threads: Option<usize>,
    name: String,
    stack_size: Option<usize>,
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            threads: None,
            name: DEFAULT_NAME.to_owned(),
            stack_size: None,
        }
    }
}

impl Builder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads.
    ///
    /// Defaults to the number of logical CPUs.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Sets the prefix used to name pool threads.
    ///
    /// Workers are named `{prefix}-worker-{i}` and the dispatcher
    /// `{prefix}-dispatcher`.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.name = prefix.into();
        self
    }

    /// Sets the stack size, in bytes, of each worker thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Starts the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread count is zero or a thread fails to
    /// spawn. Threads started before the failure are stopped and joined.
    pub fn build(self) -> Result<ThreadPool> {
        ThreadPool::start(&self)
    }

    pub(super) fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get)
    }

    pub(super) fn name_prefix(&self) -> &str {
        &self.name
    }

    pub(super) fn worker_stack_size(&self) -> Option<usize> {
        self.stack_size
    }
}
