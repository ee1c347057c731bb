//! The INI configuration file and its typed sections.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::keys::ConfigKey;
use crate::feed::{FeedSource, DEFAULT_FETCH_TIMEOUT, DEFAULT_POLL_INTERVAL_MS};
use crate::registry::{Color, RegistryConfig, DEFAULT_STALE_AFTER};
use crate::tracking::DEFAULT_TRACKING_ZOOM;

/// Directory holding the config file, under the user's home.
const CONFIG_DIR_NAME: &str = ".transitbox";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors loading, parsing or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// `[feed]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    /// Preset id; ignored when `url` is set.
    pub source: String,
    /// Custom vehicle-position URL.
    pub url: Option<String>,
    /// Vehicle color override.
    pub color: Option<Color>,
    pub interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            source: "kia".to_string(),
            url: None,
            color: None,
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
        }
    }
}

/// `[registry]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySettings {
    /// Staleness threshold in seconds; 0 disables staleness.
    pub stale_after_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            stale_after_secs: DEFAULT_STALE_AFTER.as_secs(),
        }
    }
}

/// `[camera]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    /// Throttle interval for camera `move` consumers.
    pub move_throttle_ms: u64,
    /// Debounce wait for the settled-view channel.
    pub settle_debounce_ms: u64,
    /// Interval between tracking ticks.
    pub tracking_frame_ms: u64,
    pub tracking_zoom: f64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            move_throttle_ms: 100,
            settle_debounce_ms: 250,
            tracking_frame_ms: 100,
            tracking_zoom: DEFAULT_TRACKING_ZOOM,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub level: String,
    /// Directory for daily log files; stderr only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub feed: FeedSettings,
    pub registry: RegistrySettings,
    pub camera: CameraSettings,
    pub logging: LoggingSettings,
}

/// `~/.transitbox`, or `./.transitbox` without a home directory.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Location of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

impl ConfigFile {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse INI text.
    ///
    /// Every present, non-empty value goes through [`ConfigKey::set`], so a
    /// file is held to the same rules as `config set`.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();

        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|section| non_empty(section.get(key.key_name())));
            if let Some(value) = value {
                key.set(&mut config, value)?;
            }
        }

        Ok(config)
    }

    /// Save to the default location, creating the directory if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, self.to_ini_string()).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Render as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut ini = Ini::new();
        ini.with_section(Some("feed"))
            .set("source", self.feed.source.as_str())
            .set("url", self.feed.url.clone().unwrap_or_default())
            .set(
                "color",
                self.feed.color.map(|c| c.to_string()).unwrap_or_default(),
            )
            .set("interval_ms", self.feed.interval_ms.to_string())
            .set("timeout_secs", self.feed.timeout_secs.to_string());
        ini.with_section(Some("registry"))
            .set("stale_after_secs", self.registry.stale_after_secs.to_string());
        ini.with_section(Some("camera"))
            .set("move_throttle_ms", self.camera.move_throttle_ms.to_string())
            .set("settle_debounce_ms", self.camera.settle_debounce_ms.to_string())
            .set("tracking_frame_ms", self.camera.tracking_frame_ms.to_string())
            .set("tracking_zoom", self.camera.tracking_zoom.to_string());
        ini.with_section(Some("logging"))
            .set("level", self.logging.level.as_str())
            .set(
                "directory",
                self.logging
                    .directory
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_default(),
            );

        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = ini.write_to(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    /// The feed source these settings select.
    ///
    /// A custom URL wins over the preset; an unknown preset id is an error.
    pub fn feed_source(&self) -> Result<FeedSource, ConfigError> {
        let source = match &self.feed.url {
            Some(url) => FeedSource::custom(url.clone()),
            None => FeedSource::preset_by_id(&self.feed.source).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: "feed.source".to_string(),
                    value: self.feed.source.clone(),
                    reason: "not a built-in source".to_string(),
                }
            })?,
        };
        Ok(match self.feed.color {
            Some(color) => source.with_color(color),
            None => source,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.feed.interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.timeout_secs)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        match self.registry.stale_after_secs {
            0 => RegistryConfig::without_staleness(),
            secs => RegistryConfig::with_stale_after(Duration::from_secs(secs)),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a config value, mapping failures to [`ConfigError::InvalidValue`].
pub(super) fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}
