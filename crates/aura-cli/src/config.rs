//! Service configuration – reads `~/.aura/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aura_types::AuraError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Persisted service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket port clients connect to.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Location of the JSON snapshot artifact.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Seconds between two periodic checkpoints.
    #[serde(default = "default_checkpoint_interval_secs")]
    pub checkpoint_interval_secs: u64,

    /// Upper bound on the final checkpoint at shutdown, in seconds.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_listen_port() -> u16 {
    aura_server::DEFAULT_PORT
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from("aura_knowledge.json")
}
fn default_checkpoint_interval_secs() -> u64 {
    aura_runtime::DEFAULT_INTERVAL.as_secs()
}
fn default_shutdown_grace_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            snapshot_path: default_snapshot_path(),
            checkpoint_interval_secs: default_checkpoint_interval_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl Config {
    pub fn checkpoint_interval(&self) -> Duration {
        Duration::from_secs(self.checkpoint_interval_secs.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Return the path to `~/.aura/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".aura").join("config.toml")
}

/// Resolve the effective configuration.
///
/// Reads `path` (or [`config_path`] when `None`), falls back to defaults when
/// the file is missing or invalid, then applies environment overrides.
pub fn resolve(path: Option<&Path>) -> Config {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    let mut cfg = match load_from(&path) {
        Ok(Some(cfg)) => {
            info!(path = %path.display(), "config loaded");
            cfg
        }
        Ok(None) => Config::default(),
        Err(e) => {
            warn!(error = %e, "config unusable; using defaults");
            Config::default()
        }
    };
    apply_env_overrides(&mut cfg);
    cfg
}

/// Load the config file at `path`. Returns `None` if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`AuraError::Config`] if the file exists but cannot be read or
/// parsed.
pub fn load_from(path: &Path) -> Result<Option<Config>, AuraError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| AuraError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| AuraError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `AURA_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `AURA_PORT` | `listen_port` |
/// | `AURA_SNAPSHOT_PATH` | `snapshot_path` |
/// | `AURA_CHECKPOINT_SECS` | `checkpoint_interval_secs` |
/// | `AURA_SHUTDOWN_GRACE_SECS` | `shutdown_grace_secs` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("AURA_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.listen_port = port;
    }
    if let Ok(v) = std::env::var("AURA_SNAPSHOT_PATH")
        && !v.is_empty()
    {
        cfg.snapshot_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("AURA_CHECKPOINT_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.checkpoint_interval_secs = secs;
    }
    if let Ok(v) = std::env::var("AURA_SHUTDOWN_GRACE_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.shutdown_grace_secs = secs;
    }
}
