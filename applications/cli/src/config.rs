/// CLI configuration
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use waypoint_playback::PlayerConfig;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "waypoint.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    /// Player timings and thresholds
    pub player: PlayerConfig,

    pub storage: StorageSettings,

    pub simulation: SimulationSettings,

    /// Locale used when no language was saved (default: `$LANG`)
    pub device_locale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Where progress and preferences are kept (default: ./data/progress.json)
    pub progress_file: PathBuf,

    /// Directory scanned for tour JSON files (default: ./tours)
    pub tours_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            progress_file: PathBuf::from("./data/progress.json"),
            tours_dir: PathBuf::from("./tours"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Simulated clock step (default: 250ms)
    pub tick_ms: u64,

    /// Length assumed for narrations without a duration hint (default: 30s)
    pub default_duration_seconds: f64,

    /// Length of the transition chime (default: 2s)
    pub transition_duration_seconds: f64,

    /// Artificial fetch latency for preloading (default: 0)
    pub fetch_latency_ms: u64,
}

impl SimulationSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn fetch_latency(&self) -> Duration {
        Duration::from_millis(self.fetch_latency_ms)
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            default_duration_seconds: 30.0,
            transition_duration_seconds: 2.0,
            fetch_latency_ms: 0,
        }
    }
}

impl CliConfig {
    /// Load configuration from file and environment
    ///
    /// `path` defaults to `waypoint.toml`; a missing file is not an error.
    /// Variables such as `WAYPOINT_STORAGE__TOURS_DIR` override file values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        let config_path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        if config_path.exists() {
            settings = settings.add_source(config::File::from(config_path));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("WAYPOINT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Self = settings.build()?.try_deserialize()?;
        if config.device_locale.is_none() {
            config.device_locale = std::env::var("LANG").ok().filter(|l| !l.is_empty());
        }
        Ok(config)
    }
}
