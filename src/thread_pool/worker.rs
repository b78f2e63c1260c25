use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam::channel::Receiver;
use crossbeam::sync::WaitGroup;
use log::{debug, error, trace};

use super::pool::Shared;
use super::Task;

/// Body of worker thread `id`.
///
/// Only the dispatcher holds the sending side of `tasks`, and it hands a
/// worker one task at a time. A panicking task is caught and logged, and
/// the worker goes back to waiting for the next assignment. The loop ends
/// when the dispatcher exits and drops its senders.
pub(crate) fn run(shared: Arc<Shared>, id: usize, tasks: Receiver<Task>, ready: WaitGroup) {
    debug!("Worker {id} started");
    drop(ready);

    loop {
        match tasks.recv() {
            Ok(task) => {
                trace!("Worker {id} executing task");
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                    shared.record_panic();
                    error!(
                        "Worker {id} task panicked: {}, continuing",
                        panic_message(payload.as_ref())
                    );
                }
                shared.finish(id);
            }
            Err(_) => {
                debug!("Worker {id}: dispatcher gone, shutting down");
                return;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
