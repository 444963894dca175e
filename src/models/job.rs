use std::time::{Duration, Instant};

use crate::error::PipelineError;

/// Lifecycle state of one extraction job (spec §4.9.2).
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Enqueued,
    Dequeued,
    Loading,
    Analyzing,
    Persisting,
    Done,
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// Transient, eligible for retry with backoff.
    Retry(String),
    /// Permanent, routed straight to the dead-letter channel.
    DeadLetter(String),
}

impl FailureReason {
    pub fn from_pipeline_error(err: &PipelineError) -> Self {
        if err.is_transient() {
            FailureReason::Retry(err.to_string())
        } else {
            FailureReason::DeadLetter(err.to_string())
        }
    }
}

/// One unit of work submitted to the extraction pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    pub track_id: u64,
    pub filepath: String,
    pub state: JobState,
    pub attempt: u32,
    pub enqueued_at: Instant,
}

impl Job {
    pub fn new(track_id: u64, filepath: impl Into<String>) -> Self {
        Self {
            track_id,
            filepath: filepath.into(),
            state: JobState::Enqueued,
            attempt: 0,
            enqueued_at: Instant::now(),
        }
    }

    /// Exponential backoff per spec §4.9.7: 1s, 2s, 4s for attempts 1, 2, 3.
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(1 << self.attempt.min(2))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            JobState::Done | JobState::Failed(FailureReason::DeadLetter(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_three_attempts() {
        let mut job = Job::new(1, "a.wav");
        assert_eq!(job.backoff(), Duration::from_secs(1));
        job.attempt = 1;
        assert_eq!(job.backoff(), Duration::from_secs(2));
        job.attempt = 2;
        assert_eq!(job.backoff(), Duration::from_secs(4));
        job.attempt = 10;
        assert_eq!(job.backoff(), Duration::from_secs(4));
    }

    #[test]
    fn dead_letter_is_terminal_retry_is_not() {
        let mut job = Job::new(1, "a.wav");
        job.state = JobState::Failed(FailureReason::Retry("timeout".into()));
        assert!(!job.is_terminal());
        job.state = JobState::Failed(FailureReason::DeadLetter("bad file".into()));
        assert!(job.is_terminal());
    }
}
