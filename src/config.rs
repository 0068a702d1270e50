//! Batch-run configuration: a YAML file with serde defaults, overridable
//! per-field through `BROADSIDE_*` environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::combat::simulator::{DEFAULT_BATTLE_SECONDS, DEFAULT_RATE};
use crate::data::crew::DEFAULT_CREW_PATH;
use crate::data::ship::DEFAULT_SHIPS_PATH;
use crate::runner::OrchestratorOptions;

pub const DEFAULT_CONFIG_PATH: &str = "broadside.yaml";
pub const DEFAULT_CACHE_PATH: &str = "data/battle_runs.json";
pub const DEFAULT_REPORT_DIR: &str = "reports";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_ships_path")]
    pub ships_path: PathBuf,
    #[serde(default = "default_crew_path")]
    pub crew_path: PathBuf,
    /// Battle-run cache location. None disables caching entirely.
    #[serde(default = "default_cache_path")]
    pub cache_path: Option<PathBuf>,
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
    #[serde(default = "default_seconds")]
    pub seconds: u32,
    #[serde(default = "default_rate")]
    pub rate: u32,
    /// Randomized activation-delay jitter. Off by default for reproducibility.
    #[serde(default)]
    pub simulate: bool,
    #[serde(default)]
    pub seed: u64,
    /// Subtract crewless reference damage before scoring (policy switch,
    /// see DESIGN.md).
    #[serde(default)]
    pub calibrate_against_reference: bool,
    /// Worker threads for the ship fan-out. 0 = all cores.
    #[serde(default)]
    pub workers: usize,
    /// Merge final ranks back into the ship/crew JSON files.
    #[serde(default)]
    pub write_back_ranks: bool,
}

fn default_ships_path() -> PathBuf {
    PathBuf::from(DEFAULT_SHIPS_PATH)
}

fn default_crew_path() -> PathBuf {
    PathBuf::from(DEFAULT_CREW_PATH)
}

fn default_cache_path() -> Option<PathBuf> {
    Some(PathBuf::from(DEFAULT_CACHE_PATH))
}

fn default_report_dir() -> PathBuf {
    PathBuf::from(DEFAULT_REPORT_DIR)
}

fn default_seconds() -> u32 {
    DEFAULT_BATTLE_SECONDS
}

fn default_rate() -> u32 {
    DEFAULT_RATE
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            ships_path: default_ships_path(),
            crew_path: default_crew_path(),
            cache_path: default_cache_path(),
            report_dir: default_report_dir(),
            seconds: DEFAULT_BATTLE_SECONDS,
            rate: DEFAULT_RATE,
            simulate: false,
            seed: 0,
            calibrate_against_reference: false,
            workers: 0,
            write_back_ranks: false,
        }
    }
}

impl BatchConfig {
    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            seconds: self.seconds,
            rate: self.rate,
            simulate: self.simulate,
            seed: self.seed,
            calibrate_against_reference: self.calibrate_against_reference,
        }
    }
}

/// Load the batch configuration. A missing file yields the defaults; a file
/// that exists but fails to parse is an error, not a silent fallback.
pub fn load_batch_config(path: impl AsRef<Path>) -> Result<BatchConfig, String> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        let raw = fs::read_to_string(path)
            .map_err(|err| format!("unable to read '{}': {err}", path.display()))?;
        serde_yaml::from_str(&raw)
            .map_err(|err| format!("unable to parse '{}': {err}", path.display()))?
    } else {
        BatchConfig::default()
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// `BROADSIDE_*` variables override whatever the file said. Unparseable
/// numeric values are ignored rather than fatal.
fn apply_env_overrides(config: &mut BatchConfig) {
    if let Ok(path) = env::var("BROADSIDE_SHIPS") {
        config.ships_path = PathBuf::from(path);
    }
    if let Ok(path) = env::var("BROADSIDE_CREW") {
        config.crew_path = PathBuf::from(path);
    }
    if let Ok(path) = env::var("BROADSIDE_CACHE") {
        config.cache_path = if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        };
    }
    if let Ok(dir) = env::var("BROADSIDE_REPORT_DIR") {
        config.report_dir = PathBuf::from(dir);
    }
    if let Some(workers) = env::var("BROADSIDE_WORKERS")
        .ok()
        .and_then(|raw| raw.parse().ok())
    {
        config.workers = workers;
    }
    if let Some(seed) = env::var("BROADSIDE_SEED")
        .ok()
        .and_then(|raw| raw.parse().ok())
    {
        config.seed = seed;
    }
}
