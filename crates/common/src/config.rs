//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReelError, ReelResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where exported videos are written by default.
    pub output_dir: PathBuf,

    /// Frame rendering defaults.
    pub render: RenderDefaults,

    /// Video export settings.
    pub export: ExportDefaults,

    /// Background image resolution settings.
    pub assets: AssetDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default rendering parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Output surface width in pixels.
    pub width: u32,

    /// Output surface height in pixels.
    pub height: u32,

    /// Frames per second.
    pub fps: u32,

    /// How the run loop paces itself between frames.
    pub pacing: Pacing,

    /// Font used for scene titles (bold face).
    pub title_font: Option<PathBuf>,

    /// Font used for subtitles (regular face).
    pub body_font: Option<PathBuf>,
}

/// Frame pacing strategy for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    /// Wait one frame interval per frame so playback matches wall-clock time.
    #[default]
    Realtime,
    /// Produce frames as fast as the compositor allows.
    Unthrottled,
}

/// Video export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Encoder executable.
    pub ffmpeg: PathBuf,

    /// Codec profile ids in preference order. Empty means the built-in order.
    pub codecs: Vec<String>,

    /// Target video bitrate.
    pub video_bitrate_kbps: u32,
}

/// Image resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetDefaults {
    /// Whether `http(s)://` references may be fetched.
    pub allow_remote: bool,

    /// Timeout for a single remote fetch.
    pub fetch_timeout_secs: u64,

    /// Largest encoded image accepted, in bytes.
    pub max_image_bytes: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelcast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path. Logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: dirs_default_output(),
            render: RenderDefaults::default(),
            export: ExportDefaults::default(),
            assets: AssetDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            pacing: Pacing::Realtime,
            title_font: None,
            body_font: None,
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            codecs: Vec::new(),
            video_bitrate_kbps: 8000,
        }
    }
}

impl Default for AssetDefaults {
    fn default() -> Self {
        Self {
            allow_remote: true,
            fetch_timeout_secs: 15,
            max_image_bytes: 32 * 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl RenderDefaults {
    /// Reject sizes and rates the pipeline cannot run with.
    pub fn validate(&self) -> ReelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReelError::config(format!(
                "Surface size must be non-zero (got {}x{})",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(ReelError::config(format!(
                "Surface size must be even for yuv420p encoding (got {}x{})",
                self.width, self.height
            )));
        }
        if self.fps == 0 || self.fps > 240 {
            return Err(ReelError::config(format!(
                "Frame rate must be within 1..=240 (got {})",
                self.fps
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Missing keys take their defaults.
    pub fn load_from(path: &Path) -> ReelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ReelError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ReelError::Io(e)
            }
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.render.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelcast").join("config.json")
}

/// Default export directory.
fn dirs_default_output() -> PathBuf {
    let base = std::env::var("XDG_VIDEOS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join("Videos")
        });
    base.join("reelcast")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_canonical_surface() {
        let config = AppConfig::default();
        assert_eq!(config.render.width, 1280);
        assert_eq!(config.render.height, 720);
        assert_eq!(config.render.fps, 30);
        assert_eq!(config.render.pacing, Pacing::Realtime);
        assert!(config.export.codecs.is_empty());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"render":{"fps":60,"pacing":"unthrottled"}}"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.render.fps, 60);
        assert_eq!(config.render.pacing, Pacing::Unthrottled);
        assert_eq!(config.render.width, 1280);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_config_reports_path() {
        let err = AppConfig::load_from(Path::new("/nonexistent/reelcast.json")).unwrap_err();
        assert!(matches!(err, ReelError::FileNotFound { .. }));
    }

    #[test]
    fn test_render_validation() {
        let mut render = RenderDefaults::default();
        assert!(render.validate().is_ok());
        render.fps = 0;
        assert!(render.validate().is_err());
        render.fps = 30;
        render.width = 1281;
        assert!(render.validate().is_err());
    }
}
