//! Cross-module integration tests for the extraction pipeline (spec §8
//! scenarios 3, 4, 5) and the repository's version-guard invariant (P6).

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use fingerprint_engine::cache::{MemoryCache, PersistentCache};
use fingerprint_engine::config::PipelineConfig;
use fingerprint_engine::models::Fingerprint;
use fingerprint_engine::pipeline::ExtractionPipeline;
use fingerprint_engine::repository::FingerprintRepository;

fn write_sine_wav(path: &std::path::Path, seconds: f64, sample_rate: u32) {
    let n = (sample_rate as f64 * seconds) as usize;
    let mut samples = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f64 / sample_rate as f64;
        let v = (2.0 * std::f64::consts::PI * 440.0 * t).sin();
        samples.push((v * i16::MAX as f64) as i16);
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

fn test_pipeline(
    workers: usize,
    queue_capacity: usize,
) -> (ExtractionPipeline, Arc<FingerprintRepository>) {
    let repository = Arc::new(FingerprintRepository::open_in_memory().unwrap());
    let persistent_cache = Arc::new(PersistentCache::open_in_memory(1000, 1 << 30).unwrap());
    let memory_cache = Arc::new(MemoryCache::new(100));

    let config = PipelineConfig {
        workers,
        queue_capacity,
        enqueue_timeout_sec: 5,
        job_deadline_sec: 60,
        max_retries: 3,
        sidecar_enabled: true,
        ..PipelineConfig::default()
    };

    let pipeline = ExtractionPipeline::start(&config, repository.clone(), persistent_cache, memory_cache, None);
    (pipeline, repository)
}

#[test]
fn extracts_and_persists_a_real_track() {
    let dir = tempfile::tempdir().unwrap();
    let audio_path = dir.path().join("track.wav");
    write_sine_wav(&audio_path, 3.0, 44100);

    let (pipeline, repository) = test_pipeline(2, 10);
    pipeline.submit(1, audio_path.to_string_lossy().to_string()).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(20);
    loop {
        if repository.get(1).unwrap().is_some() {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "job never completed");
        std::thread::sleep(Duration::from_millis(50));
    }

    pipeline.shutdown();
    let fp = repository.get(1).unwrap().expect("fingerprint persisted");
    assert!(fp.is_valid());
    assert_eq!(pipeline.metrics().extracted_local, 1);
}

#[test]
fn missing_file_is_dead_lettered_not_retried() {
    let (pipeline, repository) = test_pipeline(2, 10);

    pipeline.submit(42, "/nonexistent/nope.wav".to_string()).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let mut dead_letters = Vec::new();
    loop {
        dead_letters.extend(pipeline.dead_letters());
        if !dead_letters.is_empty() {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "job never dead-lettered");
        std::thread::sleep(Duration::from_millis(50));
    }

    pipeline.shutdown();
    assert!(repository.get(42).unwrap().is_none());
    assert_eq!(dead_letters[0].job.track_id, 42);
    assert_eq!(pipeline.metrics().failed_permanent, 1);
}

#[test]
fn queue_capacity_is_never_exceeded_under_burst_submission() {
    // Zero workers: nothing drains the queue, so submissions back up against
    // the bound itself (spec §4.9.5 "the queue bound IS the backpressure
    // mechanism").
    let (pipeline, _repository) = test_pipeline(0, 3);

    let mut timed_out = false;
    for i in 0..10u64 {
        if pipeline.submit(i, format!("/tmp/track-{i}.wav")).is_err() {
            timed_out = true;
            break;
        }
    }
    assert!(timed_out, "enqueue should eventually time out once the bounded queue fills");
    assert!(pipeline.queue_len() <= 3);
    pipeline.shutdown();
}

#[test]
fn repository_rejects_missing_fingerprint_version() {
    let repo = FingerprintRepository::open_in_memory().unwrap();
    let fp = Fingerprint { fingerprint_version: 0, ..Fingerprint::default() };
    assert!(repo.upsert(1, &fp).is_err());
}

#[test]
fn sidecar_round_trip_independent_of_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let audio_path = dir.path().join("track.wav");
    let mut file = std::fs::File::create(&audio_path).unwrap();
    file.write_all(b"not really audio but has stable identity").unwrap();

    let mut fp = Fingerprint::default();
    fp.sanitize();
    fingerprint_engine::cache::sidecar::write(&audio_path, &fp).unwrap();
    assert!(fingerprint_engine::cache::sidecar::is_valid(&audio_path));
}
