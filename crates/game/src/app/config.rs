use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rpg_engine::SceneId;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub(crate) const CONFIG_FILE_NAME: &str = "game.json";
pub(crate) const START_SCENE_ENV_VAR: &str = "RPG_START_SCENE";
pub(crate) const DEBUG_COLLISION_ENV_VAR: &str = "RPG_DEBUG_COLLISION";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    pub(crate) window_title: String,
    pub(crate) window_width: u32,
    pub(crate) window_height: u32,
    pub(crate) target_tps: u32,
    pub(crate) start_scene: SceneId,
    pub(crate) overworld_map: String,
    pub(crate) collision_layer: String,
    pub(crate) ramp_layer: String,
    pub(crate) spawn_layer: String,
    pub(crate) camera_zoom: f32,
    /// Pixels per second.
    pub(crate) player_speed: f32,
    pub(crate) music_volume: f32,
    pub(crate) debug_collision: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            window_title: "Tile RPG".to_string(),
            window_width: 800,
            window_height: 600,
            target_tps: 60,
            start_scene: SceneId::Menu,
            overworld_map: "overworld.tmj".to_string(),
            collision_layer: "objects_collision".to_string(),
            ramp_layer: "objects_collision".to_string(),
            spawn_layer: "objects_spawn".to_string(),
            camera_zoom: 2.0,
            player_speed: 240.0,
            music_volume: 0.5,
            debug_collision: false,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value at {field}: expected {expected}, got {actual}")]
    Invalid {
        field: &'static str,
        expected: &'static str,
        actual: String,
    },
}

impl GameConfig {
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(path, &raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Missing file means defaults. Unreadable or invalid files are reported
    /// and also fall back to defaults.
    pub(crate) fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                info!(path = %path.display(), "game_config_loaded");
                config
            }
            Err(ConfigError::Read { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "game_config_missing_using_defaults");
                Self::default()
            }
            Err(error) => {
                warn!(error = %error, "game_config_invalid_using_defaults");
                Self::default()
            }
        }
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            let json_path = error.path().to_string();
            ConfigError::Parse {
                path: path.to_path_buf(),
                json_path,
                source: error.into_inner(),
            }
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_width == 0 || self.window_height == 0 {
            return Err(ConfigError::Invalid {
                field: "window_width/window_height",
                expected: "non-zero size",
                actual: format!("{}x{}", self.window_width, self.window_height),
            });
        }
        if self.target_tps == 0 {
            return Err(ConfigError::Invalid {
                field: "target_tps",
                expected: "at least 1",
                actual: self.target_tps.to_string(),
            });
        }
        if !self.player_speed.is_finite() || self.player_speed <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "player_speed",
                expected: "finite positive number",
                actual: self.player_speed.to_string(),
            });
        }
        if !self.camera_zoom.is_finite() || self.camera_zoom <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "camera_zoom",
                expected: "finite positive number",
                actual: self.camera_zoom.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.music_volume) {
            return Err(ConfigError::Invalid {
                field: "music_volume",
                expected: "value in 0..=1",
                actual: self.music_volume.to_string(),
            });
        }
        Ok(())
    }

    /// Applies `RPG_START_SCENE` and `RPG_DEBUG_COLLISION`. Unusable values are
    /// logged and ignored.
    pub(crate) fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(START_SCENE_ENV_VAR) {
            match SceneId::from_name(&raw) {
                Some(scene) => self.start_scene = scene,
                None => warn!(
                    env_var = START_SCENE_ENV_VAR,
                    value = raw.as_str(),
                    "unknown start scene; keeping configured value"
                ),
            }
        }
        if let Some(raw) = lookup(DEBUG_COLLISION_ENV_VAR) {
            match parse_flag(&raw) {
                Some(enabled) => self.debug_collision = enabled,
                None => warn!(
                    env_var = DEBUG_COLLISION_ENV_VAR,
                    value = raw.as_str(),
                    "invalid flag value; keeping configured value"
                ),
            }
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
