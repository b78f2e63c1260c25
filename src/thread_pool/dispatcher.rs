use std::sync::Arc;

use crossbeam::channel::{SendError, Sender};
use crossbeam::sync::WaitGroup;
use log::{debug, error, trace};

use super::pool::Shared;
use super::Task;

/// Body of the dispatcher thread.
///
/// Each message on the pending channel corresponds to one `schedule` call
/// (plus one at shutdown). Before dequeuing, the dispatcher receives the id
/// of an idle worker, so a dequeued task always has somewhere to go.
/// `workers` holds the only senders to the workers' task channels; they
/// are dropped when this loop ends, which stops the workers.
pub(crate) fn run(shared: Arc<Shared>, workers: Vec<Sender<Task>>, ready: WaitGroup) {
    debug!("Dispatcher started");
    drop(ready);

    loop {
        if shared.pending_rx.recv().is_err() {
            break;
        }

        if shared.queue.is_finished() {
            break;
        }
        if shared.queue.is_empty() {
            continue;
        }

        let Ok(id) = shared.idle_rx.recv() else {
            break;
        };
        dispatch_next(&shared, &workers, id);
    }

    debug!("Dispatcher: queue closed and drained, exiting");
}

/// Moves the head task to idle worker `id`.
///
/// Dequeue and the busy-count increment happen under the drain lock, so a
/// waiter never observes the task as neither queued nor running.
fn dispatch_next(shared: &Shared, workers: &[Sender<Task>], id: usize) {
    let mut drain = shared.drain.lock().unwrap();

    let Some(task) = shared.queue.pop() else {
        drop(drain);
        shared.release_worker(id);
        return;
    };
    drain.mark_busy(id);
    drop(drain);

    trace!("Dispatcher assigned task to worker {id}");
    if let Err(SendError(task)) = workers[id].send(task) {
        // The worker thread died outside a task; retire its slot and retry
        // the task on another worker.
        error!("Worker {id} is gone, requeueing its task");
        let mut drain = shared.drain.lock().unwrap();
        drain.retire(id);
        shared.queue.push_front(task);
        drop(drain);
        shared.wake_dispatcher();
    }
}
