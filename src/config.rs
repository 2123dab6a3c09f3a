//! Application configuration
//!
//! Layered as defaults, then an optional TOML file, then environment
//! variables. The environment variable names are part of the deployment
//! contract and must not change.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::protocol::ConfigData;

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "LVS_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub model: ModelConfig,
    pub stream: StreamConfig,
}

/// HTTP / websocket binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served at `/static`, if any
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            static_dir: None,
        }
    }
}

/// Capture device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            target_fps: DEFAULT_TARGET_FPS,
        }
    }
}

impl CameraConfig {
    /// Period between pipeline iterations at the target rate
    pub fn target_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }
}

/// Detection model and tracker selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    pub tracker_config: PathBuf,
    pub confidence_threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            tracker_config: PathBuf::from(DEFAULT_TRACKER_CONFIG),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Encoding and delivery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub jpeg_quality: u8,
    pub mailbox_capacity: usize,
    pub capture_timeout_ms: u64,
    pub inference_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            capture_timeout_ms: DEFAULT_CAPTURE_TIMEOUT_MS,
            inference_timeout_ms: DEFAULT_INFERENCE_TIMEOUT_MS,
        }
    }
}

impl StreamConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }
}

impl AppConfig {
    /// Load from file (if present) and environment, then validate
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit path from `LVS_CONFIG`, else the platform config directory
    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("", "", "live-vision-streamer")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("invalid config file: {e}")))
    }

    /// Override fields from environment variables.
    ///
    /// `lookup` abstracts the environment so callers can inject values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = lookup("CAMERA_INDEX") {
            self.camera.index = parse_env("CAMERA_INDEX", &v)?;
        }
        if let Some(v) = lookup("CAMERA_WIDTH") {
            self.camera.width = parse_env("CAMERA_WIDTH", &v)?;
        }
        if let Some(v) = lookup("CAMERA_HEIGHT") {
            self.camera.height = parse_env("CAMERA_HEIGHT", &v)?;
        }
        if let Some(v) = lookup("TARGET_FPS") {
            self.camera.target_fps = parse_env("TARGET_FPS", &v)?;
        }
        if let Some(v) = lookup("YOLO_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = lookup("TRACKER_CONFIG") {
            self.model.tracker_config = PathBuf::from(v);
        }
        if let Some(v) = lookup("JPEG_QUALITY") {
            self.stream.jpeg_quality = parse_env("JPEG_QUALITY", &v)?;
        }
        if let Some(v) = lookup("CONFIDENCE_THRESHOLD") {
            self.model.confidence_threshold = parse_env("CONFIDENCE_THRESHOLD", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return Err(Error::Config(format!(
                "JPEG_QUALITY must be within 1-100, got {}",
                self.stream.jpeg_quality
            )));
        }
        let threshold = self.model.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "CONFIDENCE_THRESHOLD must be within 0-1, got {threshold}"
            )));
        }
        if self.camera.target_fps == 0 {
            return Err(Error::Config("TARGET_FPS must be positive".to_string()));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::Config(format!(
                "invalid camera resolution {}x{}",
                self.camera.width, self.camera.height
            )));
        }
        if self.stream.mailbox_capacity == 0 {
            return Err(Error::Config("mailbox capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Settings advertised to viewers in the `config` message
    pub fn public_view(&self) -> ConfigData {
        ConfigData {
            host: self.server.host.clone(),
            port: self.server.port,
            camera_resolution: format!("{}x{}", self.camera.width, self.camera.height),
            target_fps: self.camera.target_fps,
            yolo_model: self.model.model.clone(),
            jpeg_quality: self.stream.jpeg_quality,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}={value:?}: {e}")))
}

/// Tracker tuning, read from the file named by `TRACKER_CONFIG`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum overlap for a detection to continue a track
    pub iou_threshold: f32,
    /// Frames a track may go unmatched before its id retires
    pub max_missed_frames: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            max_missed_frames: 30,
        }
    }
}

impl TrackerConfig {
    /// Read the tracker file; a missing file means defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|e| {
                Error::Config(format!("invalid tracker config {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Tracker config {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.mailbox_capacity, 2);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("HOST", "127.0.0.1"),
                ("PORT", "9001"),
                ("CAMERA_INDEX", "2"),
                ("CAMERA_WIDTH", "1280"),
                ("CAMERA_HEIGHT", "720"),
                ("TARGET_FPS", "15"),
                ("YOLO_MODEL", "yolov8n.pt"),
                ("TRACKER_CONFIG", "bytetrack.toml"),
                ("JPEG_QUALITY", "65"),
                ("CONFIDENCE_THRESHOLD", "0.35"),
            ]))
            .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.camera.index, 2);
        assert_eq!((config.camera.width, config.camera.height), (1280, 720));
        assert_eq!(config.camera.target_fps, 15);
        assert_eq!(config.model.model, "yolov8n.pt");
        assert_eq!(config.model.tracker_config, PathBuf::from("bytetrack.toml"));
        assert_eq!(config.stream.jpeg_quality, 65);
        assert!((config.model.confidence_threshold - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut config = AppConfig::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("PORT")));
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let mut config = AppConfig::default();
        config.stream.jpeg_quality = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.model.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.camera.target_fps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml("[camera]\ntarget_fps = 10\n").unwrap();
        assert_eq!(config.camera.target_fps, 10);
        assert_eq!(config.camera.width, DEFAULT_WIDTH);
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_public_view() {
        let view = AppConfig::default().public_view();
        assert_eq!(view.camera_resolution, "640x480");
        assert_eq!(view.target_fps, 30);
        assert_eq!(view.yolo_model, DEFAULT_MODEL);
    }

    #[test]
    fn test_missing_tracker_config_uses_defaults() {
        let config = TrackerConfig::load(Path::new("/nonexistent/tracker.toml")).unwrap();
        assert_eq!(config, TrackerConfig::default());
    }
}
