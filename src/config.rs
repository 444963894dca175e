//! `AppConfig`: the handful of values operators tune without a redeploy,
//! loaded from an optional TOML file with environment overrides, per
//! spec §6.4.

use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub enqueue_timeout_sec: u64,
    pub job_deadline_sec: u64,
    pub max_retries: u32,
    pub sidecar_enabled: bool,
    pub persistent_cache_max_entries: usize,
    pub persistent_cache_max_bytes: u64,
    pub memory_cache_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 12,
            queue_capacity: 25,
            enqueue_timeout_sec: 30,
            job_deadline_sec: 60,
            max_retries: 3,
            sidecar_enabled: true,
            persistent_cache_max_entries: crate::cache::persistent::DEFAULT_MAX_ENTRIES,
            persistent_cache_max_bytes: crate::cache::persistent::DEFAULT_MAX_BYTES,
            memory_cache_capacity: crate::cache::memory::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub remote_analyzer_url: Option<String>,
    pub persistent_cache_path: PathBuf,
    pub repository_path: PathBuf,
    pub pipeline: PipelineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            remote_analyzer_url: None,
            persistent_cache_path: PathBuf::from("fingerprint_cache.sqlite"),
            repository_path: PathBuf::from("fingerprints.sqlite"),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads from `path` if it exists, falling back to defaults; `FINGERPRINT_BIND_ADDR`
    /// and `FINGERPRINT_REMOTE_ANALYZER_URL` override whatever the file (or default) set.
    pub fn load(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let mut cfg = match path {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(p)?;
                toml::from_str(&text)?
            }
            _ => AppConfig::default(),
        };

        if let Ok(addr) = std::env::var("FINGERPRINT_BIND_ADDR") {
            cfg.bind_addr = addr;
        }
        if let Ok(url) = std::env::var("FINGERPRINT_REMOTE_ANALYZER_URL") {
            cfg.remote_analyzer_url = Some(url);
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_needs_no_file() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.pipeline.workers, 12);
        assert_eq!(cfg.pipeline.queue_capacity, 25);
        assert!(cfg.remote_analyzer_url.is_none());
    }

    #[test]
    fn load_with_missing_path_falls_back_to_default() {
        let cfg = AppConfig::load(Some(std::path::Path::new("/nonexistent/config.toml"))).unwrap();
        assert_eq!(cfg.bind_addr, DEFAULT_BIND_ADDR);
    }
}
