//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{InsituError, InsituResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Output video defaults.
    pub video: VideoDefaults,

    /// Stress-strain curve video defaults.
    pub curve: CurveDefaults,

    /// Video compositing defaults.
    pub compose: ComposeDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default output video parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoDefaults {
    /// Frames per second of encoded output.
    pub fps: u32,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Encoder name passed to ffmpeg, or "auto" to pick by container.
    pub codec: String,
}

/// Curve-video pipeline parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveDefaults {
    /// Sheet holding the input table.
    pub sheet: String,

    /// Compression of real time when pacing frame generation.
    pub speed_factor: f64,

    /// Savitzky-Golay window length.
    pub smoothing_window: usize,

    /// Savitzky-Golay polynomial order.
    pub polyorder: usize,

    /// TrueType/OpenType font for labels. Searched in system paths when unset.
    pub font: Option<PathBuf>,
}

/// Video compositing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeDefaults {
    /// Overlay height as a fraction of the background height.
    pub overlay_scale: f64,

    /// Gap between overlay and background edges, in pixels.
    pub overlay_margin_px: u32,

    /// Encoder for composited output.
    pub codec: String,

    /// Target bitrate for composited output (ffmpeg syntax, e.g. "5000k").
    pub bitrate: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "insitu=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for VideoDefaults {
    fn default() -> Self {
        Self {
            fps: 24,
            width: 640,
            height: 480,
            codec: "auto".to_string(),
        }
    }
}

impl Default for CurveDefaults {
    fn default() -> Self {
        Self {
            sheet: "input_data".to_string(),
            speed_factor: 50.0,
            smoothing_window: 37,
            polyorder: 2,
            font: None,
        }
    }
}

impl Default for ComposeDefaults {
    fn default() -> Self {
        Self {
            overlay_scale: 0.25,
            overlay_margin_px: 10,
            codec: "libx264".to_string(),
            bitrate: "5000k".to_string(),
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

impl AppConfig {
    /// Load config from `config_path`. A missing file yields the defaults;
    /// an unreadable or malformed one is an error.
    pub fn load_from(config_path: &Path) -> InsituResult<Self> {
        let content = match std::fs::read_to_string(config_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(InsituError::config(format!(
                    "cannot read {}: {e}",
                    config_path.display()
                )))
            }
        };
        serde_json::from_str(&content).map_err(|e| {
            InsituError::config(format!("cannot parse {}: {e}", config_path.display()))
        })
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
    base.join("insitu").join("config.json")
}
