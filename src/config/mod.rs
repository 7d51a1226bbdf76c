use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio::track::LoopPoints;
use crate::error::ConfigError;

/// Player configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Master volume a new player starts with (0.0 to 1.0)
    pub default_volume: f32,
    /// Seconds used by crossfades and fade in/out
    pub crossfade_time: f32,
    /// Frame interval the CLI drives `Player::tick` at
    pub tick_interval_ms: u64,
    pub preferred_device: Option<String>,
    /// Convert tracks to this rate on import; `None` keeps the file's rate
    pub import_sample_rate: Option<u32>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: 1.0,
            crossfade_time: 2.0,
            tick_interval_ms: 16,
            preferred_device: None,
            import_sample_rate: None,
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: PlayerConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        let config = Self::load_config(&config_path).unwrap_or_default();

        Ok(Self { config, config_path })
    }

    pub fn get_config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PlayerConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ConfigError> {
        self.config.default_volume = volume.clamp(0.0, 1.0);
        self.save_config()
    }

    pub fn set_crossfade_time(&mut self, seconds: f32) -> Result<(), ConfigError> {
        self.config.crossfade_time = seconds.max(0.0);
        self.save_config()
    }

    pub fn set_preferred_device(&mut self, device: Option<String>) -> Result<(), ConfigError> {
        self.config.preferred_device = device;
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = PlayerConfig::default();
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join("seamless-looper");

        std::fs::create_dir_all(&config_dir).map_err(ConfigError::IoError)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<PlayerConfig, ConfigError> {
        if !path.exists() {
            return Ok(PlayerConfig::default());
        }

        let config_content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;

        let config: PlayerConfig = toml::from_str(&config_content).map_err(ConfigError::DeserializationError)?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::IoError)?;
        }

        let config_content = toml::to_string_pretty(&self.config).map_err(ConfigError::SerializationError)?;

        std::fs::write(&self.config_path, config_content).map_err(ConfigError::IoError)?;

        Ok(())
    }
}

fn default_compensate() -> bool {
    true
}

/// One `[[tracks]]` entry of a playlist file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackConfig {
    pub name: String,
    pub path: PathBuf,
    /// Loop start override in samples; 0 defers to the file's tags
    #[serde(default)]
    pub loop_start: u64,
    /// Loop length override in samples; 0 defers to the file's tags
    #[serde(default)]
    pub loop_length: u64,
    #[serde(default = "default_compensate")]
    pub compensate_for_frequency: bool,
}

impl TrackConfig {
    pub fn loop_points(&self) -> LoopPoints {
        LoopPoints {
            loop_start: self.loop_start,
            loop_length: self.loop_length,
            compensate_for_frequency: self.compensate_for_frequency,
        }
    }
}

/// Playlist file: the tracks a player can address by name
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlaylistConfig {
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,
}

impl PlaylistConfig {
    /// Read a playlist file. Relative track paths resolve against the
    /// playlist's own directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;
        let mut playlist = Self::parse(&content)?;

        if let Some(base) = path.parent() {
            for track in playlist.tracks.iter_mut().filter(|t| t.path.is_relative()) {
                track.path = base.join(&track.path);
            }
        }
        Ok(playlist)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let playlist: PlaylistConfig = toml::from_str(content).map_err(ConfigError::DeserializationError)?;

        for (index, track) in playlist.tracks.iter().enumerate() {
            if playlist.tracks[..index].iter().any(|other| other.name == track.name) {
                return Err(ConfigError::DuplicateTrack {
                    name: track.name.clone(),
                });
            }
        }
        Ok(playlist)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializationError)?;
        std::fs::write(path, content).map_err(ConfigError::IoError)
    }

    pub fn get(&self, name: &str) -> Option<&TrackConfig> {
        self.tracks.iter().find(|track| track.name == name)
    }
}
