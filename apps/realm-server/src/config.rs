use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 39752;

/// `config/server.json`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub tick_period_ms: u64,
    pub spawn_world: String,
    pub spawn_area: String,
    pub spawn_x: i32,
    pub spawn_y: i32,
    pub walk_speed: i32,
    /// Ticks between status log lines; 0 disables them.
    pub status_interval_ticks: u64,
    /// Snapshot archive directory, relative to the data directory.
    pub snapshot_dir: PathBuf,
    /// Ticks between archived snapshots; 0 disables them.
    pub snapshot_interval_ticks: u64,
    /// Start from the newest archived snapshot instead of the world files.
    pub restore_snapshot: bool,
    pub save_on_shutdown: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            tick_period_ms: realm_tick::SERVER_TICK_PERIOD.as_millis() as u64,
            spawn_world: realm_persist::DEFAULT_WORLD.to_string(),
            spawn_area: realm_persist::DEFAULT_AREA.to_string(),
            spawn_x: 64,
            spawn_y: 64,
            walk_speed: realm_input::DEFAULT_WALK_SPEED,
            status_interval_ticks: 1200,
            snapshot_dir: PathBuf::from("snapshots"),
            snapshot_interval_ticks: 0,
            restore_snapshot: false,
            save_on_shutdown: false,
        }
    }
}

impl ServerConfig {
    /// Read `path`, writing the defaults there first when it does not exist.
    pub fn load_or_create(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
            }
            let json = serde_json::to_string_pretty(&config)?;
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "default config written");
            return Ok(config);
        }
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Configured tick period, never zero.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("server.json");
        let config = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert!(path.exists());
        assert_eq!(ServerConfig::load_or_create(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        fs::write(&path, r#"{"port": 4000, "tick_period_ms": 0}"#).unwrap();
        let config = ServerConfig::load_or_create(&path).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.spawn_world, "default");
        assert_eq!(config.tick_period(), Duration::from_millis(1));
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        fs::write(&path, "{port").unwrap();
        let err = ServerConfig::load_or_create(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));
    }
}
