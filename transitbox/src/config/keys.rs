//! Typed access to individual configuration keys.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::{parse_value, ConfigError, ConfigFile};
use crate::feed::FeedSource;

/// Upper bound for the camera timing keys, one hour.
pub const MAX_CAMERA_DELAY_MS: u64 = 3_600_000;

/// A `section.key` configuration entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    FeedSource,
    FeedUrl,
    FeedColor,
    FeedIntervalMs,
    FeedTimeoutSecs,
    RegistryStaleAfterSecs,
    CameraMoveThrottleMs,
    CameraSettleDebounceMs,
    CameraTrackingFrameMs,
    CameraTrackingZoom,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// Every key, in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::FeedSource,
            ConfigKey::FeedUrl,
            ConfigKey::FeedColor,
            ConfigKey::FeedIntervalMs,
            ConfigKey::FeedTimeoutSecs,
            ConfigKey::RegistryStaleAfterSecs,
            ConfigKey::CameraMoveThrottleMs,
            ConfigKey::CameraSettleDebounceMs,
            ConfigKey::CameraTrackingFrameMs,
            ConfigKey::CameraTrackingZoom,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
        ]
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::FeedSource => "feed.source",
            ConfigKey::FeedUrl => "feed.url",
            ConfigKey::FeedColor => "feed.color",
            ConfigKey::FeedIntervalMs => "feed.interval_ms",
            ConfigKey::FeedTimeoutSecs => "feed.timeout_secs",
            ConfigKey::RegistryStaleAfterSecs => "registry.stale_after_secs",
            ConfigKey::CameraMoveThrottleMs => "camera.move_throttle_ms",
            ConfigKey::CameraSettleDebounceMs => "camera.settle_debounce_ms",
            ConfigKey::CameraTrackingFrameMs => "camera.tracking_frame_ms",
            ConfigKey::CameraTrackingZoom => "camera.tracking_zoom",
            ConfigKey::LoggingLevel => "logging.level",
            ConfigKey::LoggingDirectory => "logging.directory",
        }
    }

    pub fn section(&self) -> &'static str {
        self.name().split_once('.').map_or("", |(section, _)| section)
    }

    pub fn key_name(&self) -> &'static str {
        self.name().split_once('.').map_or("", |(_, key)| key)
    }

    /// Current value as text; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::FeedSource => config.feed.source.clone(),
            ConfigKey::FeedUrl => config.feed.url.clone().unwrap_or_default(),
            ConfigKey::FeedColor => config
                .feed
                .color
                .map(|c| c.to_string())
                .unwrap_or_default(),
            ConfigKey::FeedIntervalMs => config.feed.interval_ms.to_string(),
            ConfigKey::FeedTimeoutSecs => config.feed.timeout_secs.to_string(),
            ConfigKey::RegistryStaleAfterSecs => config.registry.stale_after_secs.to_string(),
            ConfigKey::CameraMoveThrottleMs => config.camera.move_throttle_ms.to_string(),
            ConfigKey::CameraSettleDebounceMs => config.camera.settle_debounce_ms.to_string(),
            ConfigKey::CameraTrackingFrameMs => config.camera.tracking_frame_ms.to_string(),
            ConfigKey::CameraTrackingZoom => config.camera.tracking_zoom.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validate and set a value. An empty value clears optional keys.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let name = self.name();
        match self {
            ConfigKey::FeedSource => {
                if FeedSource::preset_by_id(value).is_none() {
                    return Err(self.invalid(value, "not a built-in source"));
                }
                config.feed.source = value.to_ascii_lowercase();
            }
            ConfigKey::FeedUrl => {
                if !value.is_empty() && !value.starts_with("http://") && !value.starts_with("https://")
                {
                    return Err(self.invalid(value, "expected an http(s) URL"));
                }
                config.feed.url = (!value.is_empty()).then(|| value.to_string());
            }
            ConfigKey::FeedColor => {
                config.feed.color = if value.is_empty() {
                    None
                } else {
                    Some(parse_value(name, value)?)
                };
            }
            ConfigKey::FeedIntervalMs => {
                let ms: u64 = parse_value(name, value)?;
                if ms == 0 {
                    return Err(self.invalid(value, "must be greater than zero"));
                }
                config.feed.interval_ms = ms;
            }
            ConfigKey::FeedTimeoutSecs => {
                let secs: u64 = parse_value(name, value)?;
                if secs == 0 {
                    return Err(self.invalid(value, "must be greater than zero"));
                }
                config.feed.timeout_secs = secs;
            }
            ConfigKey::RegistryStaleAfterSecs => {
                config.registry.stale_after_secs = parse_value(name, value)?
            }
            ConfigKey::CameraMoveThrottleMs => {
                config.camera.move_throttle_ms = self.camera_delay(value, 0)?
            }
            ConfigKey::CameraSettleDebounceMs => {
                config.camera.settle_debounce_ms = self.camera_delay(value, 0)?
            }
            ConfigKey::CameraTrackingFrameMs => {
                config.camera.tracking_frame_ms = self.camera_delay(value, 1)?
            }
            ConfigKey::CameraTrackingZoom => {
                let zoom: f64 = parse_value(name, value)?;
                if !(0.0..=crate::camera::MAX_ZOOM).contains(&zoom) {
                    return Err(self.invalid(value, "zoom out of range"));
                }
                config.camera.tracking_zoom = zoom;
            }
            ConfigKey::LoggingLevel => {
                if value.is_empty() {
                    return Err(self.invalid(value, "level cannot be empty"));
                }
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = (!value.is_empty()).then(|| PathBuf::from(value));
            }
        }
        Ok(())
    }

    fn camera_delay(&self, value: &str, min: u64) -> Result<u64, ConfigError> {
        let ms: u64 = parse_value(self.name(), value)?;
        if !(min..=MAX_CAMERA_DELAY_MS).contains(&ms) {
            return Err(self.invalid(
                value,
                &format!("expected {}..={} milliseconds", min, MAX_CAMERA_DELAY_MS),
            ));
        }
        Ok(ms)
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_names() {
        assert_eq!("feed.url".parse::<ConfigKey>().unwrap(), ConfigKey::FeedUrl);
        assert_eq!(
            "Camera.Tracking_Zoom".parse::<ConfigKey>().unwrap(),
            ConfigKey::CameraTrackingZoom
        );
        assert!(matches!(
            "feed.nope".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_section_and_key_name() {
        let key = ConfigKey::RegistryStaleAfterSecs;
        assert_eq!(key.section(), "registry");
        assert_eq!(key.key_name(), "stale_after_secs");
    }

    #[test]
    fn test_every_key_round_trips_through_get_and_set() {
        let config = ConfigFile::default();
        let mut copy = config.clone();
        for key in ConfigKey::all() {
            let value = key.get(&config);
            key.set(&mut copy, &value).unwrap();
        }
        assert_eq!(copy, config);
    }

    #[test]
    fn test_set_validates() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::FeedIntervalMs.set(&mut config, "0").is_err());
        assert!(ConfigKey::FeedUrl.set(&mut config, "ftp://x").is_err());
        assert!(ConfigKey::FeedSource.set(&mut config, "nowhere").is_err());
        assert!(ConfigKey::CameraTrackingZoom.set(&mut config, "30").is_err());
        assert!(ConfigKey::FeedTimeoutSecs.set(&mut config, "0").is_err());
        assert!(ConfigKey::CameraTrackingFrameMs.set(&mut config, "0").is_err());
        assert!(ConfigKey::CameraSettleDebounceMs
            .set(&mut config, &u64::MAX.to_string())
            .is_err());
        ConfigKey::CameraMoveThrottleMs.set(&mut config, "0").unwrap();
        ConfigKey::CameraSettleDebounceMs
            .set(&mut config, &MAX_CAMERA_DELAY_MS.to_string())
            .unwrap();

        ConfigKey::FeedColor.set(&mut config, "#112233").unwrap();
        assert_eq!(ConfigKey::FeedColor.get(&config), "#112233");
        ConfigKey::FeedColor.set(&mut config, "").unwrap();
        assert_eq!(config.feed.color, None);
    }
}
