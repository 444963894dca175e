//! ExtractionPipeline (C9): bounded job queue, OS-threaded worker pool, and
//! the job state machine of spec §4.9.

pub mod dead_letter;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod worker;

pub use dead_letter::DeadLetter;
pub use metrics::MetricsSnapshot;
pub use pipeline::{ExtractionPipeline, SubmitOutcome};
pub use queue::EnqueueError;
