//! Unbounded FIFO between producers and workers, with an idle barrier
//!
//! Every non-shutdown operation is counted when it is pushed and uncounted
//! when a worker reports it complete. An operation that re-enqueues work
//! (a released or requeued edge) pushes before it completes, so the count
//! can only reach zero when nothing is queued and nothing is executing.

use std::sync::{Condvar, Mutex, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::operation::Operation;

pub struct OperationQueue {
    tx: Sender<Operation>,
    rx: Receiver<Operation>,
    outstanding: Mutex<usize>,
    idle: Condvar,
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            outstanding: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    /// Append at the tail. Never blocks.
    pub fn push(&self, op: Operation) {
        if !op.is_shutdown() {
            *self.lock() += 1;
        }
        // The queue owns a receiver, so the channel cannot be disconnected.
        let _ = self.tx.send(op);
    }

    /// Block until an operation is available
    pub fn pop(&self) -> Option<Operation> {
        self.rx.recv().ok()
    }

    /// Mark one popped, non-shutdown operation as finished
    pub fn complete(&self) {
        let mut outstanding = self.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.idle.notify_all();
        }
    }

    /// Block until no counted operation is queued or executing
    pub fn wait_idle(&self) {
        let mut outstanding = self.lock();
        while *outstanding > 0 {
            outstanding = self
                .idle
                .wait(outstanding)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Counted operations queued or executing
    pub fn outstanding(&self) -> usize {
        *self.lock()
    }

    /// Messages currently sitting in the channel, shutdown pills included
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, usize> {
        self.outstanding.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::VertexSpec;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn vertex(id: &str) -> Operation {
        Operation::CreateVertex(VertexSpec {
            id: id.into(),
            vertex_type: "Person".into(),
            properties: None,
        })
    }

    #[test]
    fn test_fifo_order_and_counting() {
        let queue = OperationQueue::new();
        queue.push(vertex("a"));
        queue.push(vertex("b"));
        queue.push(Operation::Shutdown);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.outstanding(), 2);
        assert_eq!(queue.pop(), Some(vertex("a")));
        assert_eq!(queue.pop(), Some(vertex("b")));
        assert_eq!(queue.pop(), Some(Operation::Shutdown));
        assert!(queue.is_empty());

        // Popped but not complete: still outstanding.
        assert_eq!(queue.outstanding(), 2);
        queue.complete();
        queue.complete();
        assert_eq!(queue.outstanding(), 0);
    }

    #[test]
    fn test_wait_idle_returns_immediately_when_empty() {
        let queue = OperationQueue::new();
        queue.wait_idle();
    }

    #[test]
    fn test_wait_idle_covers_requeue_in_flight() {
        let queue = Arc::new(OperationQueue::new());
        queue.push(vertex("a"));

        let worker = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let first = queue.pop().unwrap();
                // Channel is empty here but the op is still executing.
                thread::sleep(Duration::from_millis(20));
                queue.push(first);
                queue.complete();

                let again = queue.pop().unwrap();
                assert_eq!(again, vertex("a"));
                thread::sleep(Duration::from_millis(20));
                queue.complete();
            })
        };

        queue.wait_idle();
        assert_eq!(queue.outstanding(), 0);
        assert!(queue.is_empty());
        worker.join().unwrap();
    }
}
