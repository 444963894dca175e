//! ExtractionPipeline (C9): the producer-facing façade around the bounded
//! queue, worker pool, and shutdown token (spec §4.9).

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cache::sidecar;
use crate::cache::{MemoryCache, PersistentCache};
use crate::client::AnalyzerClient;
use crate::config::PipelineConfig;
use crate::models::Job;
use crate::repository::FingerprintRepository;

use super::dead_letter::{self, DeadLetterReceiver};
use super::metrics::{MetricsSnapshot, PipelineMetrics};
use super::queue::{EnqueueError, JobQueue};
use super::worker::{self, WorkerContext};

pub struct ExtractionPipeline {
    queue: JobQueue,
    metrics: Arc<PipelineMetrics>,
    shutdown: Arc<AtomicBool>,
    in_flight: Arc<Mutex<HashSet<u64>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    dead_letter_rx: DeadLetterReceiver,
    sidecar_enabled: bool,
    repository: Arc<FingerprintRepository>,
    memory_cache: Arc<MemoryCache>,
}

pub enum SubmitOutcome {
    /// Satisfied immediately from the sidecar fast path (§4.9.3); never
    /// touched the queue.
    FastPathHit,
    /// Admitted to the queue for worker processing.
    Enqueued,
    /// Already in flight for this `track_id`; the duplicate was dropped.
    AlreadyInFlight,
}

impl ExtractionPipeline {
    pub fn start(
        config: &PipelineConfig,
        repository: Arc<FingerprintRepository>,
        persistent_cache: Arc<PersistentCache>,
        memory_cache: Arc<MemoryCache>,
        analyzer_client: Option<Arc<AnalyzerClient>>,
    ) -> Self {
        let queue = JobQueue::new(config.queue_capacity, Duration::from_secs(config.enqueue_timeout_sec));
        let metrics = Arc::new(PipelineMetrics::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(Mutex::new(HashSet::new()));
        let (dead_letter_tx, dead_letter_rx) = dead_letter::channel();

        let ctx = Arc::new(WorkerContext {
            queue: queue.clone(),
            memory_cache: memory_cache.clone(),
            persistent_cache,
            repository: repository.clone(),
            analyzer_client,
            metrics: metrics.clone(),
            dead_letter: dead_letter_tx,
            sidecar_enabled: config.sidecar_enabled,
            max_retries: config.max_retries,
            job_deadline: Duration::from_secs(config.job_deadline_sec),
            shutdown: shutdown.clone(),
            in_flight: in_flight.clone(),
        });

        let mut handles = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let ctx = ctx.clone();
            handles.push(
                std::thread::Builder::new()
                    .name(format!("extraction-worker-{worker_id}"))
                    .spawn(move || worker::run(ctx))
                    .expect("failed to spawn extraction worker thread"),
            );
        }

        tracing::info!(workers = config.workers, capacity = config.queue_capacity, "extraction pipeline started");

        Self {
            queue,
            metrics,
            shutdown,
            in_flight,
            handles: Mutex::new(handles),
            dead_letter_rx,
            sidecar_enabled: config.sidecar_enabled,
            repository,
            memory_cache,
        }
    }

    /// Submits one `(track_id, filepath)` job. Tries the sidecar fast path
    /// first (§4.9.3); only enqueues on a miss.
    pub fn submit(&self, track_id: u64, filepath: impl Into<String>) -> Result<SubmitOutcome, EnqueueError> {
        let filepath = filepath.into();

        if self.sidecar_enabled {
            if let Some(fp) = sidecar::read(Path::new(&filepath)) {
                if let Ok(()) = self.repository.upsert(track_id, &fp) {
                    if let Ok(id) = sidecar::AudioIdentity::from_path(Path::new(&filepath)) {
                        let key = crate::cache::CacheKey { size_bytes: id.size_bytes, mtime_ns: id.mtime_ns };
                        self.memory_cache.put(key, fp);
                    }
                    self.metrics.incr_sidecar_hit();
                    return Ok(SubmitOutcome::FastPathHit);
                }
            }
        }

        {
            let mut guard = self.in_flight.lock();
            if !guard.insert(track_id) {
                tracing::debug!(track_id, "duplicate submission while job in flight, dropped");
                return Ok(SubmitOutcome::AlreadyInFlight);
            }
        }

        let job = Job::new(track_id, filepath);
        match self.queue.enqueue(job) {
            Ok(()) => Ok(SubmitOutcome::Enqueued),
            Err(e) => {
                self.in_flight.lock().remove(&track_id);
                Err(e)
            }
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn dead_letters(&self) -> Vec<dead_letter::DeadLetter> {
        self.dead_letter_rx.drain()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Signals shutdown: workers finish their in-flight job, then stop
    /// dequeuing (§4.9.6). Blocks until every worker thread has exited.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let mut handles = self.handles.lock();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
        tracing::info!("extraction pipeline shut down");
    }
}
