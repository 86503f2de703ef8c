//! tunedeck-ap specific configuration
//!
//! Runtime settings derived from the shared TOML configuration, with
//! millisecond fields converted to `Duration`s.

use std::path::PathBuf;
use std::time::Duration;
use tunedeck_common::config::{EngineSection, TomlConfig};

/// Engine timing and analyzer parameters
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Fade-in on play and fade-out on pause
    pub fade: Duration,
    /// Ramp for volume changes
    pub volume_ramp: Duration,
    /// Wait after the pause fade before output halts
    pub pause_margin: Duration,
    /// Analyzer transform window
    pub fft_size: usize,
    /// Polling loop period
    pub frame_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&EngineSection::default())
    }
}

impl From<&EngineSection> for EngineConfig {
    fn from(section: &EngineSection) -> Self {
        Self {
            fade: Duration::from_millis(section.fade_ms),
            volume_ramp: Duration::from_millis(section.volume_ramp_ms),
            pause_margin: Duration::from_millis(section.pause_margin_ms),
            fft_size: section.fft_size,
            frame_interval: Duration::from_millis(section.frame_interval_ms.max(1)),
        }
    }
}

/// Audio Player configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// SQLite settings file (None = in-memory settings)
    pub settings_db: Option<PathBuf>,
    /// Track library file
    pub library: Option<PathBuf>,
    /// Minimum spacing of progress events
    pub progress_interval: Duration,
    pub engine: EngineConfig,
}

impl From<&TomlConfig> for Config {
    fn from(toml: &TomlConfig) -> Self {
        Self {
            port: toml.port,
            settings_db: toml.settings_db.clone(),
            library: toml.library.clone(),
            progress_interval: Duration::from_millis(toml.progress_interval_ms),
            engine: EngineConfig::from(&toml.engine),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from(&TomlConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.fade, Duration::from_millis(200));
        assert_eq!(config.volume_ramp, Duration::from_millis(120));
        assert_eq!(config.pause_margin, Duration::from_millis(10));
        assert_eq!(config.fft_size, 1024);
        assert_eq!(config.frame_interval, Duration::from_millis(16));
    }

    #[test]
    fn test_from_toml() {
        let toml = TomlConfig::from_toml_str("progress_interval_ms = 500\n[engine]\nfade_ms = 50\n").unwrap();
        let config = Config::from(&toml);
        assert_eq!(config.progress_interval, Duration::from_millis(500));
        assert_eq!(config.engine.fade, Duration::from_millis(50));
        assert!(config.settings_db.is_none());
    }
}
