//! Per-terminal-state counters the pipeline must emit (spec §4.9.7).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub extracted_local: AtomicU64,
    pub extracted_remote: AtomicU64,
    pub sidecar_hit: AtomicU64,
    pub memory_hit: AtomicU64,
    pub persistent_hit: AtomicU64,
    pub failed_permanent: AtomicU64,
    pub failed_retries_exceeded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub extracted_local: u64,
    pub extracted_remote: u64,
    pub sidecar_hit: u64,
    pub memory_hit: u64,
    pub persistent_hit: u64,
    pub failed_permanent: u64,
    pub failed_retries_exceeded: u64,
}

impl PipelineMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            extracted_local: self.extracted_local.load(Ordering::Relaxed),
            extracted_remote: self.extracted_remote.load(Ordering::Relaxed),
            sidecar_hit: self.sidecar_hit.load(Ordering::Relaxed),
            memory_hit: self.memory_hit.load(Ordering::Relaxed),
            persistent_hit: self.persistent_hit.load(Ordering::Relaxed),
            failed_permanent: self.failed_permanent.load(Ordering::Relaxed),
            failed_retries_exceeded: self.failed_retries_exceeded.load(Ordering::Relaxed),
        }
    }
}

impl PipelineMetrics {
    pub fn incr_extracted_local(&self) {
        self.extracted_local.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_extracted_remote(&self) {
        self.extracted_remote.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_sidecar_hit(&self) {
        self.sidecar_hit.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_memory_hit(&self) {
        self.memory_hit.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_persistent_hit(&self) {
        self.persistent_hit.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_failed_permanent(&self) {
        self.failed_permanent.fetch_add(1, Ordering::Relaxed);
    }
    pub fn incr_failed_retries_exceeded(&self) {
        self.failed_retries_exceeded.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let m = PipelineMetrics::default();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
        m.incr_extracted_local();
        m.incr_extracted_local();
        m.incr_sidecar_hit();
        let snap = m.snapshot();
        assert_eq!(snap.extracted_local, 2);
        assert_eq!(snap.sidecar_hit, 1);
    }
}
