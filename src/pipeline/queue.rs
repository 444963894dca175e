//! Bounded MPMC job queue (spec §4.9.1). The bound IS the backpressure
//! mechanism — an unbounded queue is explicitly forbidden (§4.9.5).

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvError, SendTimeoutError, Sender};

use crate::models::Job;

pub const DEFAULT_CAPACITY: usize = 25;
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct JobQueue {
    tx: Sender<Job>,
    rx: Receiver<Job>,
    enqueue_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error("enqueue timed out after {0:?}")]
    Timeout(Duration),
    #[error("queue is closed")]
    Closed,
}

impl JobQueue {
    pub fn new(capacity: usize, enqueue_timeout: Duration) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        Self { tx, rx, enqueue_timeout }
    }

    /// Blocking enqueue with the configured timeout. On timeout, the caller
    /// (producer) is responsible for backpressure policy (drop/retry).
    pub fn enqueue(&self, job: Job) -> Result<(), EnqueueError> {
        match self.tx.send_timeout(job, self.enqueue_timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(EnqueueError::Timeout(self.enqueue_timeout)),
            Err(SendTimeoutError::Disconnected(_)) => Err(EnqueueError::Closed),
        }
    }

    /// Blocking receive used by worker threads.
    pub fn dequeue(&self) -> Result<Job, RecvError> {
        self.rx.recv()
    }

    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<Job> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.tx.capacity()
    }

    /// Disconnects the sending side shared by this handle; workers blocked
    /// in `dequeue` observe a closed channel once every clone is dropped.
    pub fn close(self) {
        drop(self.tx);
    }
}
