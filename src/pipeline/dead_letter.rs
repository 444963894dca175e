//! Dead-letter channel: collects `{job, error}` pairs for permanently failed
//! jobs (spec §7, "a dead-letter channel collects `{job, error}` pairs for
//! later inspection").

use crossbeam_channel::{Receiver, Sender};

use crate::models::Job;

#[derive(Debug)]
pub struct DeadLetter {
    pub job: Job,
    pub reason: String,
}

#[derive(Clone)]
pub struct DeadLetterSender(Sender<DeadLetter>);

pub struct DeadLetterReceiver(Receiver<DeadLetter>);

pub fn channel() -> (DeadLetterSender, DeadLetterReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (DeadLetterSender(tx), DeadLetterReceiver(rx))
}

impl DeadLetterSender {
    pub fn send(&self, job: Job, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::info!(track_id = job.track_id, reason = %reason, "job dead-lettered");
        let _ = self.0.send(DeadLetter { job, reason });
    }
}

impl DeadLetterReceiver {
    /// Drains everything currently buffered, non-blocking.
    pub fn drain(&self) -> Vec<DeadLetter> {
        self.0.try_iter().collect()
    }

    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<DeadLetter> {
        self.0.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_entries_are_drained_in_order() {
        let (tx, rx) = channel();
        tx.send(Job::new(1, "a.wav"), "corrupt");
        tx.send(Job::new(2, "b.wav"), "not found");
        let drained = rx.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].job.track_id, 1);
        assert_eq!(drained[1].reason, "not found");
    }
}
