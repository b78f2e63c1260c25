use std::collections::VecDeque;
use std::sync::Mutex;

use super::Task;
use crate::{PoolError, Result};

/// The pending-task FIFO shared by submitters and the dispatcher.
///
/// The `closed` flag lives under the same lock as the tasks, so a push
/// either lands before shutdown closes the queue or is rejected.
pub(crate) struct TaskQueue {
    inner: Mutex<QueueInner>,
}

struct QueueInner {
    tasks: VecDeque<Task>,
    closed: bool,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        TaskQueue {
            inner: Mutex::new(QueueInner {
                tasks: VecDeque::new(),
                closed: false,
            }),
        }
    }

    /// Appends a task at the tail.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::ShutDown` once the queue has been closed.
    pub(crate) fn push(&self, task: Task) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.closed {
            return Err(PoolError::ShutDown);
        }
        inner.tasks.push_back(task);
        Ok(())
    }

    /// Puts a task back at the head, ahead of everything queued after it.
    pub(crate) fn push_front(&self, task: Task) {
        self.inner.lock().unwrap().tasks.push_front(task);
    }

    /// Removes the head task.
    pub(crate) fn pop(&self) -> Option<Task> {
        self.inner.lock().unwrap().tasks.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().tasks.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().tasks.len()
    }

    /// Rejects all further pushes. Tasks already queued stay queued.
    pub(crate) fn close(&self) {
        self.inner.lock().unwrap().closed = true;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// True once the queue is closed and nothing is left to hand out.
    pub(crate) fn is_finished(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.closed && inner.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::TaskQueue;
    use crate::PoolError;

    fn recording(log: &Arc<Mutex<Vec<usize>>>, id: usize) -> super::Task {
        let log = Arc::clone(log);
        Box::new(move || log.lock().unwrap().push(id))
    }

    #[test]
    fn pops_in_push_order() {
        let queue = TaskQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            queue.push(recording(&log, id)).unwrap();
        }
        assert_eq!(queue.len(), 3);

        while let Some(task) = queue.pop() {
            task();
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn push_front_goes_to_head() {
        let queue = TaskQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.push(recording(&log, 1)).unwrap();
        queue.push_front(recording(&log, 0));

        while let Some(task) = queue.pop() {
            task();
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn closed_queue_rejects_pushes_but_keeps_pending() {
        let queue = TaskQueue::new();
        queue.push(Box::new(|| {})).unwrap();
        queue.close();

        assert!(queue.is_closed());
        assert!(matches!(queue.push(Box::new(|| {})), Err(PoolError::ShutDown)));
        assert!(!queue.is_finished());

        queue.pop().unwrap();
        assert!(queue.is_finished());
    }
}
