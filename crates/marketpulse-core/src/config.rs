//! MarketPulse configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PulseError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl PulseConfig {
    /// Load config from the default path (~/.marketpulse/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PulseError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| PulseError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PulseError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the MarketPulse home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".marketpulse")
    }
}

/// Action queue / store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Maximum retry attempts before an action is permanently failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Hours an in-progress claim may age before orphan recovery reclaims it.
    #[serde(default = "default_orphan_age_hours")]
    pub orphan_age_hours: u64,
}

fn default_db_path() -> String {
    "~/.marketpulse/actions.db".into()
}
fn default_max_retries() -> u32 {
    10
}
fn default_orphan_age_hours() -> u64 {
    24
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_retries: default_max_retries(),
            orphan_age_hours: default_orphan_age_hours(),
        }
    }
}

/// Worker loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Seconds between polling cycles.
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
    /// Maximum random jitter (seconds) added to each polling cycle.
    #[serde(default = "default_jitter_secs")]
    pub poll_jitter_secs: u64,
    /// Maximum actions fetched per polling cycle.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
}

fn default_poll_secs() -> u64 {
    60
}
fn default_jitter_secs() -> u64 {
    5
}
fn default_batch_limit() -> usize {
    10
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_secs(),
            poll_jitter_secs: default_jitter_secs(),
            batch_limit: default_batch_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PulseConfig::default();
        assert_eq!(cfg.queue.max_retries, 10);
        assert_eq!(cfg.queue.orphan_age_hours, 24);
        assert_eq!(cfg.worker.poll_interval_secs, 60);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: PulseConfig = toml::from_str(
            r#"
            [worker]
            poll_interval_secs = 15
            "#,
        )
        .unwrap();
        assert_eq!(cfg.worker.poll_interval_secs, 15);
        assert_eq!(cfg.worker.batch_limit, 10);
        assert_eq!(cfg.queue.max_retries, 10);
    }
}
