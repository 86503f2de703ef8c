//! Configuration loading and config file resolution
//!
//! Missing configuration is never fatal: the player starts with compiled
//! defaults and logs a warning. A file that exists but fails to parse or
//! validate is an error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TUNEDECK_CONFIG";

/// Default HTTP control port
pub const DEFAULT_PORT: u16 = 5750;

/// Engine tuning parameters (`[engine]` table)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Fade-in on play / fade-out on pause, milliseconds
    pub fade_ms: u64,
    /// Ramp length for volume changes while playing, milliseconds
    pub volume_ramp_ms: u64,
    /// Extra wait after the pause fade before output is halted, milliseconds
    pub pause_margin_ms: u64,
    /// Analyzer transform window (power of two, 32..=32768)
    pub fft_size: usize,
    /// Polling loop period, milliseconds
    pub frame_interval_ms: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            fade_ms: 200,
            volume_ramp_ms: 120,
            pause_margin_ms: 10,
            fft_size: 1024,
            frame_interval_ms: 16,
        }
    }
}

/// Top-level TOML configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP control port
    pub port: u16,
    /// SQLite settings database (None = in-memory settings)
    pub settings_db: Option<PathBuf>,
    /// Track library file (`[[tracks]]` tables)
    pub library: Option<PathBuf>,
    /// Minimum spacing of PlaybackProgress events, milliseconds
    pub progress_interval_ms: u64,
    pub engine: EngineSection,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            settings_db: None,
            library: None,
            progress_interval_ms: 1000,
            engine: EngineSection::default(),
        }
    }
}

impl TomlConfig {
    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let fft = self.engine.fft_size;
        if !fft.is_power_of_two() || !(32..=32768).contains(&fft) {
            return Err(Error::Config(format!(
                "engine.fft_size must be a power of two in 32..=32768, got {}",
                fft
            )));
        }
        if self.engine.frame_interval_ms == 0 {
            return Err(Error::Config(
                "engine.frame_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration following the resolution priority order:
    /// 1. Explicit path (command line)
    /// 2. `TUNEDECK_CONFIG` environment variable
    /// 3. `<config_dir>/tunedeck/config.toml`
    /// 4. Compiled defaults
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = match resolve_config_path(cli_path) {
            Some(path) => path,
            None => {
                warn!("No configuration file found, using compiled defaults");
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            warn!(
                "Configuration file {} does not exist, using compiled defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Pick the configuration file path by priority, without checking existence
/// for explicit choices
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_file().filter(|path| path.exists())
}

/// `<config_dir>/tunedeck/config.toml` for the current platform
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tunedeck").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.engine.fade_ms, 200);
        assert_eq!(config.engine.volume_ramp_ms, 120);
        assert_eq!(config.engine.fft_size, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            port = 6000

            [engine]
            fade_ms = 350
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.engine.fade_ms, 350);
        assert_eq!(config.engine.pause_margin_ms, 10);
        assert_eq!(config.progress_interval_ms, 1000);
    }

    #[test]
    fn test_rejects_bad_fft_size() {
        let err = TomlConfig::from_toml_str("[engine]\nfft_size = 1000\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = TomlConfig::from_toml_str("[engine]\nfft_size = 16\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_zero_frame_interval() {
        assert!(TomlConfig::from_toml_str("[engine]\nframe_interval_ms = 0\n").is_err());
    }
}
