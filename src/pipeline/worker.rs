//! Worker loop: the job state machine of spec §4.9.2/§4.9.4, run on a plain
//! OS thread per worker (no cooperative multitasking inside CPU-bound
//! analysis, per §4.9.6).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::analysis;
use crate::cache::persistent::CacheKey;
use crate::cache::sidecar;
use crate::cache::{MemoryCache, PersistentCache};
use crate::client::AnalyzerClient;
use crate::error::{AnalysisError, DecodeError, PipelineError};
use crate::models::{Fingerprint, Job, JobState};
use crate::repository::FingerprintRepository;

use super::dead_letter::DeadLetterSender;
use super::metrics::PipelineMetrics;
use super::queue::JobQueue;

pub struct WorkerContext {
    pub queue: JobQueue,
    pub memory_cache: Arc<MemoryCache>,
    pub persistent_cache: Arc<PersistentCache>,
    pub repository: Arc<FingerprintRepository>,
    pub analyzer_client: Option<Arc<AnalyzerClient>>,
    pub metrics: Arc<PipelineMetrics>,
    pub dead_letter: DeadLetterSender,
    pub sidecar_enabled: bool,
    pub max_retries: u32,
    pub job_deadline: Duration,
    pub shutdown: Arc<AtomicBool>,
    pub in_flight: Arc<Mutex<std::collections::HashSet<u64>>>,
}

/// Runs until `ctx.shutdown` is set; finishes any in-flight job first, then
/// stops dequeuing (spec §4.9.6 cancellation semantics).
pub fn run(ctx: Arc<WorkerContext>) {
    loop {
        if ctx.shutdown.load(Ordering::Relaxed) {
            break;
        }
        let job = match ctx.queue.dequeue_timeout(Duration::from_millis(200)) {
            Some(j) => j,
            None => continue,
        };
        process_job(&ctx, job);
    }
}

fn cache_key_for(filepath: &str) -> Option<CacheKey> {
    sidecar::AudioIdentity::from_path(Path::new(filepath))
        .ok()
        .map(|id| CacheKey { size_bytes: id.size_bytes, mtime_ns: id.mtime_ns })
}

fn process_job(ctx: &WorkerContext, mut job: Job) {
    let track_id = job.track_id;
    let _span = tracing::info_span!("job", track_id, attempt = job.attempt).entered();
    let started = std::time::Instant::now();

    job.state = JobState::Dequeued;
    let cache_key = cache_key_for(&job.filepath);

    job.state = JobState::Loading;

    if let Some(key) = &cache_key {
        if let Some(fp) = ctx.memory_cache.get(key) {
            ctx.metrics.incr_memory_hit();
            finish_with_fingerprint(ctx, job, fp, false, cache_key);
            return;
        }
    }

    if let Some(key) = &cache_key {
        if let Some(fp) = ctx.persistent_cache.get(key) {
            ctx.metrics.incr_persistent_hit();
            ctx.memory_cache.put(*key, fp);
            finish_with_fingerprint(ctx, job, fp, false, cache_key);
            return;
        }
    }

    job.state = JobState::Analyzing;

    if started.elapsed() > ctx.job_deadline {
        retry_or_dead_letter(ctx, job, PipelineError::Deadline);
        return;
    }

    let remote_result = try_remote(ctx, &job);
    let fp = match remote_result {
        Some(fp) => {
            ctx.metrics.incr_extracted_remote();
            fp
        }
        None => match analysis::analyze(&job.filepath) {
            Ok(fp) => {
                ctx.metrics.incr_extracted_local();
                fp
            }
            Err(e) => {
                let pe = analysis_err_to_pipeline(e);
                fail_permanently(ctx, job, pe);
                return;
            }
        },
    };

    finish_with_fingerprint(ctx, job, fp, true, cache_key);
}

/// Attempts the remote analyzer with bounded retries, per spec §4.9.7. Falls
/// through to `None` (meaning: use the local analyzer) on exhaustion or if
/// no healthy remote is configured — never fails the job itself.
fn try_remote(ctx: &WorkerContext, job: &Job) -> Option<Fingerprint> {
    let client = ctx.analyzer_client.as_ref()?;
    if !client.is_healthy() {
        return None;
    }

    let mut attempt = 0u32;
    loop {
        match client.analyze(job.track_id, &job.filepath) {
            Ok(resp) => return Some(resp.fingerprint),
            Err(e) => {
                attempt += 1;
                tracing::warn!(track_id = job.track_id, attempt, error = %e, "remote analyzer call failed");
                if attempt > ctx.max_retries {
                    return None;
                }
                std::thread::sleep(Duration::from_secs(1 << (attempt - 1).min(2)));
            }
        }
    }
}

fn finish_with_fingerprint(
    ctx: &WorkerContext,
    mut job: Job,
    mut fp: Fingerprint,
    persist_caches: bool,
    cache_key: Option<CacheKey>,
) {
    job.state = JobState::Persisting;
    fp.sanitize();
    if !fp.is_valid() {
        fail_permanently(
            ctx,
            job,
            PipelineError::Analysis(AnalysisError::NumericDegenerate(
                "fingerprint still non-finite after sanitization".to_string(),
            )),
        );
        return;
    }

    if let Err(e) = ctx.repository.upsert(job.track_id, &fp) {
        retry_or_dead_letter(ctx, job, PipelineError::Persist(e));
        return;
    }

    if persist_caches {
        if ctx.sidecar_enabled {
            if let Err(e) = sidecar::write(Path::new(&job.filepath), &fp) {
                tracing::warn!(track_id = job.track_id, error = %e, "sidecar write failed");
            }
        }
        if let Some(key) = cache_key {
            if let Err(e) = ctx.persistent_cache.put(&key, &fp) {
                tracing::warn!(track_id = job.track_id, error = %e, "persistent cache write failed");
            }
            ctx.memory_cache.put(key, fp);
        }
    }

    job.state = JobState::Done;
    ctx.in_flight.lock().remove(&job.track_id);
    tracing::debug!(track_id = job.track_id, "job done");
}

fn retry_or_dead_letter(ctx: &WorkerContext, mut job: Job, pe: PipelineError) {
    if pe.is_transient() && job.attempt < ctx.max_retries {
        let backoff = job.backoff();
        job.attempt += 1;
        job.state = JobState::Enqueued;
        tracing::debug!(track_id = job.track_id, attempt = job.attempt, ?backoff, "retrying job");
        std::thread::sleep(backoff);
        if ctx.queue.enqueue(job.clone()).is_err() {
            ctx.metrics.incr_failed_retries_exceeded();
            ctx.in_flight.lock().remove(&job.track_id);
            ctx.dead_letter.send(job, "requeue failed: queue closed or full");
        }
    } else {
        ctx.metrics.incr_failed_retries_exceeded();
        ctx.in_flight.lock().remove(&job.track_id);
        ctx.dead_letter.send(job, pe.to_string());
    }
}

fn fail_permanently(ctx: &WorkerContext, job: Job, pe: PipelineError) {
    ctx.metrics.incr_failed_permanent();
    ctx.in_flight.lock().remove(&job.track_id);
    ctx.dead_letter.send(job, pe.to_string());
}

fn analysis_err_to_pipeline(e: AnalysisError) -> PipelineError {
    if let AnalysisError::Decode(DecodeError::Io(io)) = &e {
        if io.kind() == std::io::ErrorKind::NotFound {
            return PipelineError::FileNotFound(io.to_string());
        }
    }
    PipelineError::Analysis(e)
}
