pub mod fingerprint;
pub mod job;
pub mod request;

pub use fingerprint::{Fingerprint, FINGERPRINT_VERSION};
pub use job::{FailureReason, Job, JobState};
pub use request::{AudioMetadata, FingerprintRequest, FingerprintResponse, HealthResponse};
