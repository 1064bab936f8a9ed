use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Backoff for failed status polls (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 5.0,
            max_delay_secs: 300,
        }
    }
}

/// Number of concurrent workers per pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub submit: usize,
    pub monitor: usize,
    pub download: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            submit: 10,
            monitor: 10,
            download: 10,
        }
    }
}

/// Commands used by the DIRAC command-line backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub submit_command: String,
    pub reschedule_command: String,
    pub status_command: String,
    pub output_command: String,
    /// Upper bound for a single backend command, in seconds.
    pub command_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            submit_command: "dirac-wms-job-submit".to_string(),
            reschedule_command: "dirac-wms-job-reschedule".to_string(),
            status_command: "dirac-wms-job-status".to_string(),
            output_command: "dirac-wms-job-get-output".to_string(),
            command_timeout_secs: 600,
        }
    }
}

/// Global configuration loaded from `~/.config/gjm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GjmConfig {
    /// Download retries granted to each newly submitted job.
    pub download_retries: u32,
    /// Minimum time between two status polls of the same job.
    pub poll_interval_secs: u64,
    /// Delay before a failed download is attempted again.
    pub download_retry_delay_secs: u64,
    /// Interval of the status summary line.
    pub report_interval_secs: u64,
    #[serde(default)]
    pub workers: WorkerConfig,
    /// Optional poll-failure backoff; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional backend command overrides.
    #[serde(default)]
    pub backend: Option<BackendConfig>,
}

impl Default for GjmConfig {
    fn default() -> Self {
        Self {
            download_retries: 1,
            poll_interval_secs: 10,
            download_retry_delay_secs: 30,
            report_interval_secs: 5,
            workers: WorkerConfig::default(),
            retry: None,
            backend: None,
        }
    }
}

impl GjmConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn download_retry_delay(&self) -> Duration {
        Duration::from_secs(self.download_retry_delay_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("gjm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GjmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GjmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: GjmConfig = toml::from_str(&data)?;
    Ok(cfg)
}
