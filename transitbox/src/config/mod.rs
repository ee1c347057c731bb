//! Configuration file support.
//!
//! Settings live in an INI file at `~/.transitbox/config.ini`:
//!
//! ```ini
//! [feed]
//! source = kia
//! url =
//! color =
//! interval_ms = 10000
//! timeout_secs = 30
//!
//! [registry]
//! stale_after_secs = 120
//!
//! [camera]
//! move_throttle_ms = 100
//! settle_debounce_ms = 250
//! tracking_frame_ms = 100
//! tracking_zoom = 15
//!
//! [logging]
//! level = info
//! directory =
//! ```
//!
//! Missing keys take their defaults. [`ConfigKey`] gives typed access to each
//! key by its `section.key` name.

mod file;
mod keys;

pub use file::{
    config_directory, config_file_path, CameraSettings, ConfigError, ConfigFile, FeedSettings,
    LoggingSettings, RegistrySettings,
};
pub use keys::{ConfigKey, MAX_CAMERA_DELAY_MS};
