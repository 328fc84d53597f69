//! Configuration file
//!
//! Every section falls back to its defaults, so a partial JSON file only
//! needs the keys it changes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::display::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::error::{Error, Result};
use crate::physics::PhysicsConfig;
use crate::sampler::SamplingConfig;
use crate::state::TimingConfig;

pub const DEFAULT_CONFIG_PATH: &str = "liquidclock.json";

/// Window size in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    /// Physical pixels per logical pixel
    pub pixel_ratio: f32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            pixel_ratio: 1.0,
            vsync: true,
        }
    }
}

/// Remote control endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Unix socket for line commands; `None` disables it
    pub socket_path: Option<PathBuf>,
    /// MQTT broker; `None` disables MQTT
    pub mqtt_host: Option<String>,
    pub mqtt_port: u16,
    pub mqtt_topic: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: Some(PathBuf::from("/tmp/liquidclock.sock")),
            mqtt_host: None,
            mqtt_port: 1883,
            mqtt_topic: "liquidclock".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub physics: PhysicsConfig,
    pub sampling: SamplingConfig,
    pub timing: TimingConfig,
    pub control: ControlConfig,
}

impl Config {
    /// Load from `path`. A missing file yields the defaults; a file that
    /// exists but does not parse is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::Config(format!("{}: {}", path.display(), e))),
        };
        let config = serde_json::from_str(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("liquidclock-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load(temp_path("missing")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{ "physics": { "friction": 0.9 }, "timing": { "reveal_ms": 600 } }"#)
            .unwrap();
        let config = Config::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.physics.friction, 0.9);
        assert_eq!(config.physics.max_ease, PhysicsConfig::default().max_ease);
        assert_eq!(config.timing.reveal_ms, 600);
        assert_eq!(config.timing.result_hold_ms, 5000);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = temp_path("malformed");
        fs::write(&path, "{ physics: ").unwrap();
        let result = Config::load(&path);
        fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("saved");
        let mut config = Config::default();
        config.sampling.font_path = Some("/usr/share/fonts/clock.ttf".to_string());
        config.control.mqtt_host = Some("broker.local".to_string());
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
