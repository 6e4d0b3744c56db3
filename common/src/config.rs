use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },
}

/// storyreel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    /// Base URL of the generation service, e.g. `http://localhost:8000/api/v1`
    pub base_url: String,
    /// Where exported artifacts are written
    pub output_dir: PathBuf,
    /// Capture frame rate for video export
    pub frame_rate: u32,
    /// On-screen time for a slide whose audio length cannot be read
    pub default_slide_secs: f64,
    /// Audio player invocation; `{file}` is replaced with the clip path
    pub player_command: Vec<String>,
    /// Play each clip while a video capture runs
    pub monitor_capture: bool,
    pub ffmpeg_path: PathBuf,
    /// Transport timeout for generation requests; none by default
    pub request_timeout_secs: Option<u64>,
    pub log_path: Option<PathBuf>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from("."),
            frame_rate: 30,
            default_slide_secs: 3.0,
            player_command: vec![
                "ffplay".to_string(),
                "-nodisp".to_string(),
                "-autoexit".to_string(),
                "-loglevel".to_string(),
                "quiet".to_string(),
                "{file}".to_string(),
            ],
            monitor_capture: true,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            request_timeout_secs: None,
            log_path: None,
        }
    }
}

impl StoryConfig {
    /// Default config file location: `<config dir>/storyreel/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("storyreel").join("config.toml"))
    }

    /// Load configuration from an explicit file, or from the default location
    /// when it exists, then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => {
                    tracing::debug!("Using default configuration");
                    Self::default()
                }
            },
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("STORYREEL_BASE_URL") {
            self.base_url = url;
        }
        if let Some(dir) = lookup("STORYREEL_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(player) = lookup("STORYREEL_PLAYER") {
            match shlex::split(&player) {
                Some(words) if !words.is_empty() => self.player_command = words,
                _ => tracing::warn!("Ignoring unparseable STORYREEL_PLAYER: {player}"),
            }
        }
        if let Some(ffmpeg) = lookup("STORYREEL_FFMPEG") {
            self.ffmpeg_path = PathBuf::from(ffmpeg);
        }
        if let Some(path) = lookup("STORYREEL_LOG_PATH") {
            self.log_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_rate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "frame_rate".to_string(),
                value: self.frame_rate.to_string(),
            });
        }
        if !self.default_slide_secs.is_finite() || self.default_slide_secs <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "default_slide_secs".to_string(),
                value: self.default_slide_secs.to_string(),
            });
        }
        if self.player_command.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "player_command".to_string(),
                value: "[]".to_string(),
            });
        }
        Ok(())
    }

    pub fn default_slide_duration(&self) -> Duration {
        Duration::from_secs_f64(self.default_slide_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn log_path_or_default(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("storyreel.log"))
    }
}
