//! CLI that drives `ExtractionPipeline` over a manifest of
//! `track_id\tfilepath` lines, the batch-analysis counterpart to the
//! `fingerprint-server` binary's per-request HTTP path.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use fingerprint_engine::cache::{MemoryCache, PersistentCache};
use fingerprint_engine::client::AnalyzerClient;
use fingerprint_engine::config::AppConfig;
use fingerprint_engine::pipeline::ExtractionPipeline;
use fingerprint_engine::repository::FingerprintRepository;

#[derive(Parser, Debug)]
#[command(name = "pipeline-runner", version, about = "Bulk-extract 25D fingerprints for a manifest of tracks")]
struct Cli {
    /// Manifest file: one `track_id<TAB>filepath` line per track.
    manifest: PathBuf,

    /// Optional TOML config file (see AppConfig).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Poll interval while waiting for the queue to drain.
    #[arg(long, default_value = "500")]
    poll_interval_ms: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    let jobs = read_manifest(&cli.manifest)?;
    tracing::info!(jobs = jobs.len(), manifest = %cli.manifest.display(), "loaded manifest");

    let repository = Arc::new(FingerprintRepository::open(&config.repository_path)?);
    let persistent_cache = Arc::new(PersistentCache::open(
        &config.persistent_cache_path,
        config.pipeline.persistent_cache_max_entries,
        config.pipeline.persistent_cache_max_bytes,
    )?);
    let memory_cache = Arc::new(MemoryCache::new(config.pipeline.memory_cache_capacity));

    let analyzer_client = config
        .remote_analyzer_url
        .as_deref()
        .map(AnalyzerClient::new)
        .transpose()?
        .map(Arc::new);

    let pipeline = ExtractionPipeline::start(&config.pipeline, repository, persistent_cache, memory_cache, analyzer_client);

    let total = jobs.len();
    for (track_id, filepath) in jobs {
        pipeline.submit(track_id, filepath).context("failed to submit job")?;
    }

    while pipeline.queue_len() > 0 {
        std::thread::sleep(Duration::from_millis(cli.poll_interval_ms));
        tracing::debug!(queued = pipeline.queue_len(), "waiting for queue to drain");
    }

    // Give in-flight jobs a moment to finish persisting after the queue
    // itself empties.
    std::thread::sleep(Duration::from_millis(cli.poll_interval_ms));
    pipeline.shutdown();

    let snapshot = pipeline.metrics();
    let dead_letters = pipeline.dead_letters();
    tracing::info!(
        total,
        extracted_local = snapshot.extracted_local,
        extracted_remote = snapshot.extracted_remote,
        sidecar_hit = snapshot.sidecar_hit,
        memory_hit = snapshot.memory_hit,
        persistent_hit = snapshot.persistent_hit,
        failed_permanent = snapshot.failed_permanent,
        failed_retries_exceeded = snapshot.failed_retries_exceeded,
        dead_lettered = dead_letters.len(),
        "pipeline run complete"
    );

    for entry in &dead_letters {
        tracing::warn!(track_id = entry.job.track_id, filepath = %entry.job.filepath, reason = %entry.reason, "dead-lettered");
    }

    Ok(())
}

fn read_manifest(path: &std::path::Path) -> Result<Vec<(u64, String)>> {
    let file = std::fs::File::open(path).with_context(|| format!("opening manifest {}", path.display()))?;
    let reader = std::io::BufReader::new(file);
    let mut jobs = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, '\t');
        let track_id: u64 = parts
            .next()
            .context("missing track_id column")?
            .parse()
            .context("track_id must be a u64")?;
        let filepath = parts.next().context("missing filepath column")?.to_string();
        jobs.push((track_id, filepath));
    }

    Ok(jobs)
}
