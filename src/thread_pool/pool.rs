use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::sync::WaitGroup;
use log::{debug, error, info};

use super::queue::TaskQueue;
use super::{dispatcher, worker, Builder, Task};
use crate::{PoolError, Result};

/// Lifecycle of a [`ThreadPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting and running tasks.
    Running,
    /// Shutdown has begun: new tasks are rejected, queued ones still run.
    ShuttingDown,
    /// The dispatcher and every worker have been joined.
    Stopped,
}

/// A point-in-time snapshot of pool activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Tasks scheduled but not yet handed to a worker.
    pub queued: usize,
    /// Workers currently running a task.
    pub busy: usize,
    /// Tasks that have finished, including ones that panicked.
    pub completed: u64,
    /// Tasks that panicked.
    pub panicked: u64,
}

/// Per-worker availability and the busy count, guarded by the drain lock.
///
/// `busy` always equals the number of live slots with `available == false`.
pub(crate) struct DrainState {
    busy: usize,
    available: Vec<bool>,
}

impl DrainState {
    fn new(threads: usize) -> Self {
        DrainState {
            busy: 0,
            available: vec![true; threads],
        }
    }

    pub(crate) fn mark_busy(&mut self, id: usize) {
        debug_assert!(self.available[id], "worker {id} assigned twice");
        self.available[id] = false;
        self.busy += 1;
    }

    fn mark_idle(&mut self, id: usize) {
        debug_assert!(!self.available[id], "worker {id} finished while idle");
        self.available[id] = true;
        self.busy -= 1;
    }

    /// Drops a dead worker from the busy count without making it available.
    pub(crate) fn retire(&mut self, id: usize) {
        debug_assert!(!self.available[id]);
        self.busy -= 1;
    }
}

/// State shared between the pool handle, the dispatcher and the workers.
pub(crate) struct Shared {
    pub(crate) queue: TaskQueue,
    /// One message per scheduled task, plus one at shutdown.
    pending_tx: Sender<()>,
    pub(crate) pending_rx: Receiver<()>,
    /// Ids of workers that are free to take a task.
    idle_tx: Sender<usize>,
    pub(crate) idle_rx: Receiver<usize>,
    pub(crate) drain: Mutex<DrainState>,
    drained: Condvar,
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl Shared {
    fn new(threads: usize) -> Self {
        let (pending_tx, pending_rx) = channel::unbounded();
        let (idle_tx, idle_rx) = channel::bounded(threads);
        let shared = Shared {
            queue: TaskQueue::new(),
            pending_tx,
            pending_rx,
            idle_tx,
            idle_rx,
            drain: Mutex::new(DrainState::new(threads)),
            drained: Condvar::new(),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        };
        for id in 0..threads {
            shared.release_worker(id);
        }
        shared
    }

    /// Tells the dispatcher there may be work, or that shutdown began.
    pub(crate) fn wake_dispatcher(&self) {
        if self.pending_tx.send(()).is_err() {
            error!("Dispatcher wake-up channel closed");
        }
    }

    /// Puts worker `id` back in the idle set.
    pub(crate) fn release_worker(&self, id: usize) {
        if self.idle_tx.send(id).is_err() {
            error!("Idle-worker channel closed, worker {id} lost");
        }
    }

    /// Must be called with the drain lock held.
    fn is_drained(&self, drain: &DrainState) -> bool {
        drain.busy == 0 && self.queue.is_empty()
    }

    /// Returns worker `id` to the idle set after its task completed.
    pub(crate) fn finish(&self, id: usize) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        {
            let mut drain = self.drain.lock().unwrap();
            drain.mark_idle(id);
            if self.is_drained(&drain) {
                self.drained.notify_all();
            }
        }
        self.release_worker(id);
    }

    pub(crate) fn record_panic(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    fn wait(&self) {
        let drain = self.drain.lock().unwrap();
        let _drain = self
            .drained
            .wait_while(drain, |drain| !self.is_drained(drain))
            .unwrap();
    }
}

struct Threads {
    dispatcher: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Threads {
    /// True when called from the dispatcher or one of the workers.
    fn contains_current(&self) -> bool {
        let current = thread::current().id();
        self.dispatcher
            .iter()
            .chain(&self.workers)
            .any(|handle| handle.thread().id() == current)
    }
}

/// A fixed-size thread pool with a single FIFO dispatcher.
///
/// Tasks are handed to workers in the order they were scheduled; with more
/// than one worker they may finish in any order. At most
/// [`threads`](ThreadPool::threads) tasks run at once.
///
/// All methods take `&self`, so the pool can be shared between submitters
/// through an `Arc`. Dropping the pool waits for every scheduled task and
/// then stops its threads.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// use dispatch_pool::ThreadPool;
///
/// let pool = ThreadPool::new(4)?;
/// let counter = Arc::new(AtomicUsize::new(0));
/// for _ in 0..10 {
///     let counter = Arc::clone(&counter);
///     pool.schedule(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     })?;
/// }
/// pool.wait();
/// assert_eq!(counter.load(Ordering::SeqCst), 10);
/// # Ok::<(), dispatch_pool::PoolError>(())
/// ```
pub struct ThreadPool {
    shared: Arc<Shared>,
    threads: usize,
    state: Mutex<PoolState>,
    handles: Mutex<Option<Threads>>,
}

impl ThreadPool {
    /// Creates a pool with `threads` workers and default settings.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidSize` for zero threads and
    /// `PoolError::Spawn` if a thread cannot be started.
    pub fn new(threads: usize) -> Result<Self> {
        Builder::new().threads(threads).build()
    }

    /// Returns a builder for a customized pool.
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(super) fn start(builder: &Builder) -> Result<Self> {
        let threads = builder.thread_count();
        if threads == 0 {
            return Err(PoolError::InvalidSize);
        }

        let shared = Arc::new(Shared::new(threads));
        let ready = WaitGroup::new();
        let mut handles = Threads {
            dispatcher: None,
            workers: Vec::with_capacity(threads),
        };

        if let Err(e) = spawn_threads(&shared, builder, &ready, &mut handles) {
            error!("Failed to start thread pool: {e}");
            if let Err(stop_err) = stop_threads(&shared, handles) {
                error!("Failed to roll back partially started pool: {stop_err}");
            }
            return Err(e);
        }
        ready.wait();

        info!("Thread pool started with {threads} workers");
        Ok(ThreadPool {
            shared,
            threads,
            state: Mutex::new(PoolState::Running),
            handles: Mutex::new(Some(handles)),
        })
    }

    /// Schedules `task` to run on one of the pool's workers.
    ///
    /// Never blocks waiting for a free worker: the queue is unbounded.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::ShutDown` once shutdown has begun.
    pub fn schedule<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.queue.push(Box::new(task))?;
        self.shared.wake_dispatcher();
        Ok(())
    }

    /// Blocks until every task scheduled so far has completed.
    ///
    /// Tasks scheduled by other threads while this call is blocked are
    /// waited for too. Returns immediately when the pool is idle. Calling
    /// this from inside a task deadlocks, since that task counts as busy.
    pub fn wait(&self) {
        self.shared.wait();
    }

    /// Waits for all scheduled tasks, then stops and joins every pool thread.
    ///
    /// Calling it again, or on a pool that already stopped, does nothing.
    ///
    /// When called from inside a task (typically because the task dropped
    /// the last `Arc` to the pool), the pool cannot wait for or join the
    /// calling thread. It closes the queue and detaches its threads instead;
    /// they finish the queued tasks and exit on their own, and the state
    /// stays `ShuttingDown`.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::ThreadPanicked` if a pool thread died outside of a
    /// task. The remaining threads are still joined.
    pub fn shutdown(&self) -> Result<()> {
        let mut handles = self.handles.lock().unwrap();
        let Some(threads) = handles.take() else {
            return Ok(());
        };

        self.shared.queue.close();
        *self.state.lock().unwrap() = PoolState::ShuttingDown;
        debug!("Thread pool shutting down");

        if threads.contains_current() {
            debug!("Shutdown requested from a pool thread, detaching pool threads");
            self.shared.wake_dispatcher();
            return Ok(());
        }

        let result = stop_threads(&self.shared, threads);

        *self.state.lock().unwrap() = PoolState::Stopped;
        let stats = self.stats();
        info!(
            "Thread pool stopped: {} tasks completed, {} panicked",
            stats.completed, stats.panicked
        );
        result
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        *self.state.lock().unwrap()
    }

    /// Snapshot of queue depth, busy workers and task counters.
    pub fn stats(&self) -> PoolStats {
        let drain = self.shared.drain.lock().unwrap();
        PoolStats {
            queued: self.shared.queue.len(),
            busy: drain.busy,
            completed: self.shared.completed.load(Ordering::Relaxed),
            panicked: self.shared.panicked.load(Ordering::Relaxed),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Thread pool shutdown failed: {e}");
        }
    }
}

fn spawn_threads(
    shared: &Arc<Shared>,
    builder: &Builder,
    ready: &WaitGroup,
    handles: &mut Threads,
) -> Result<()> {
    let threads = builder.thread_count();
    let mut senders = Vec::with_capacity(threads);

    for id in 0..threads {
        let (tx, rx) = channel::bounded::<Task>(1);
        senders.push(tx);

        let shared = Arc::clone(shared);
        let ready = ready.clone();
        let mut worker_thread =
            thread::Builder::new().name(format!("{}-worker-{id}", builder.name_prefix()));
        if let Some(size) = builder.worker_stack_size() {
            worker_thread = worker_thread.stack_size(size);
        }
        handles
            .workers
            .push(worker_thread.spawn(move || worker::run(shared, id, rx, ready))?);
    }

    // The senders move into the dispatcher. If it fails to start they are
    // dropped with the closure, and the workers already running exit.
    let shared = Arc::clone(shared);
    let ready = ready.clone();
    let dispatcher = thread::Builder::new()
        .name(format!("{}-dispatcher", builder.name_prefix()))
        .spawn(move || dispatcher::run(shared, senders, ready))?;
    handles.dispatcher = Some(dispatcher);

    Ok(())
}

/// Closes the queue, drains it, then stops the dispatcher and joins it.
/// The dispatcher drops the workers' task senders on exit, so the workers
/// leave their loops once it is gone and are joined last.
fn stop_threads(shared: &Shared, threads: Threads) -> Result<()> {
    shared.queue.close();
    shared.wait();

    let mut result = Ok(());

    shared.wake_dispatcher();
    if let Some(dispatcher) = threads.dispatcher {
        if let Err(e) = join(dispatcher) {
            result = Err(e);
        }
    }

    for worker in threads.workers {
        if let Err(e) = join(worker) {
            if result.is_ok() {
                result = Err(e);
            }
        }
    }

    result
}

fn join(handle: JoinHandle<()>) -> Result<()> {
    let name = handle.thread().name().unwrap_or("<unnamed>").to_owned();
    handle.join().map_err(|_| {
        error!("Pool thread {name} panicked");
        PoolError::ThreadPanicked(name)
    })
}

#[cfg(test)]
mod tests {
    use super::DrainState;

    #[test]
    fn busy_count_tracks_unavailable_slots() {
        let mut drain = DrainState::new(3);
        drain.mark_busy(0);
        drain.mark_busy(2);
        assert_eq!(drain.busy, 2);
        assert_eq!(drain.available, vec![false, true, false]);

        drain.mark_idle(0);
        assert_eq!(drain.busy, 1);
        assert_eq!(drain.available, vec![true, true, false]);

        drain.retire(2);
        assert_eq!(drain.busy, 0);
        assert!(!drain.available[2]);
    }
}
