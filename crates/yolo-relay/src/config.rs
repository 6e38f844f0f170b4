use crate::bus::{self, validate_topic};
use crate::source::SourceType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the camera node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraNodeConfig {
    /// V4L2 device index (`/dev/video{n}`), used when `address` is unset
    #[serde(default)]
    pub device: Option<u32>,
    /// Stream URL or video file; takes precedence over `device`
    #[serde(default)]
    pub address: Option<String>,
    /// Target publish rate
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// JPEG quality for published frames (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_frame_topic")]
    pub frame_topic: String,
    /// Topic carrying new camera addresses; `null` disables re-opening
    #[serde(default = "default_address_topic")]
    pub address_topic: Option<String>,
    /// How long to wait for a frame before treating the device as dead
    #[serde(default = "default_capture_timeout_ms")]
    pub capture_timeout_ms: u64,
}

fn default_fps() -> f64 {
    30.0
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_frame_topic() -> String {
    bus::FRAME_TOPIC.to_string()
}

fn default_address_topic() -> Option<String> {
    Some(bus::CAMERA_ADDRESS_TOPIC.to_string())
}

fn default_capture_timeout_ms() -> u64 {
    2000
}

impl Default for CameraNodeConfig {
    fn default() -> Self {
        Self {
            device: None,
            address: None,
            fps: default_fps(),
            jpeg_quality: default_jpeg_quality(),
            frame_topic: default_frame_topic(),
            address_topic: default_address_topic(),
            capture_timeout_ms: default_capture_timeout_ms(),
        }
    }
}

impl CameraNodeConfig {
    /// The address the camera is opened with at startup: `address`, else the
    /// device index. With neither set the node waits for an address on
    /// `address_topic`, or falls back to device 0 when re-opening is disabled.
    pub fn source_address(&self) -> Option<String> {
        match (&self.address, self.device, &self.address_topic) {
            (Some(address), _, _) => Some(address.clone()),
            (None, Some(device), _) => Some(device.to_string()),
            (None, None, Some(_)) => None,
            (None, None, None) => Some("0".to_string()),
        }
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fps.is_finite() && self.fps > 0.0 && self.fps <= 240.0) {
            return Err(ConfigError::ValidationError(format!(
                "fps must be in (0, 240], got {}",
                self.fps
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::ValidationError(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.device.is_some() && self.address.is_some() {
            return Err(ConfigError::ValidationError(
                "set either device or address, not both".to_string(),
            ));
        }
        if matches!(&self.address, Some(a) if a.trim().is_empty()) {
            return Err(ConfigError::ValidationError("address is empty".to_string()));
        }
        if self.capture_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "capture_timeout_ms must be positive".to_string(),
            ));
        }
        check_topic(&self.frame_topic)?;
        if let Some(topic) = &self.address_topic {
            check_topic(topic)?;
        }
        Ok(())
    }
}

/// Model settings for the detector node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// YOLO ONNX export
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
    /// Square network input size in pixels
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default = "default_iou")]
    pub iou: f32,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/best.onnx")
}

fn default_input_size() -> u32 {
    640
}

fn default_confidence() -> f32 {
    0.25
}

fn default_iou() -> f32 {
    0.45
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            input_size: default_input_size(),
            confidence: default_confidence(),
            iou: default_iou(),
        }
    }
}

/// Configuration for the detector node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorNodeConfig {
    #[serde(default)]
    pub source_type: SourceType,
    /// Image or video path; required unless `source_type` is `camera`
    #[serde(default)]
    pub source: Option<PathBuf>,
    #[serde(default = "default_frame_topic")]
    pub frame_topic: String,
    #[serde(default = "default_result_topic")]
    pub result_topic: String,
    /// Delay between polls of an empty frame cache
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive empty polls before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub model: ModelConfig,
    /// Overrides the built-in class label table
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

fn default_result_topic() -> String {
    bus::RESULT_TOPIC.to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_max_retries() -> u32 {
    50
}

impl Default for DetectorNodeConfig {
    fn default() -> Self {
        Self {
            source_type: SourceType::default(),
            source: None,
            frame_topic: default_frame_topic(),
            result_topic: default_result_topic(),
            poll_interval_ms: default_poll_interval_ms(),
            max_retries: default_max_retries(),
            model: ModelConfig::default(),
            labels: None,
        }
    }
}

impl DetectorNodeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Path of the image or video to process.
    pub fn source_path(&self) -> Result<&Path, ConfigError> {
        self.source.as_deref().ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "source is required for source_type '{}'",
                self.source_type
            ))
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_type != SourceType::Camera {
            self.source_path()?;
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "max_retries must be positive".to_string(),
            ));
        }
        if self.model.input_size == 0 || self.model.input_size % 32 != 0 {
            return Err(ConfigError::ValidationError(format!(
                "model.input_size must be a positive multiple of 32, got {}",
                self.model.input_size
            )));
        }
        for (name, value) in [("confidence", self.model.confidence), ("iou", self.model.iou)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::ValidationError(format!(
                    "model.{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        if matches!(&self.labels, Some(labels) if labels.is_empty()) {
            return Err(ConfigError::ValidationError(
                "labels must not be empty when set".to_string(),
            ));
        }
        check_topic(&self.frame_topic)?;
        check_topic(&self.result_topic)?;
        Ok(())
    }
}

/// Configuration for the monitor node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorNodeConfig {
    /// Key expressions to listen on
    #[serde(default = "default_monitor_topics")]
    pub topics: Vec<String>,
    /// Also decode camera frames and log their size
    #[serde(default)]
    pub watch_frames: bool,
    #[serde(default = "default_frame_topic")]
    pub frame_topic: String,
    /// Overwrite this file with every decodable frame (needs `watch_frames`)
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

fn default_monitor_topics() -> Vec<String> {
    vec![bus::YOLO_WILDCARD.to_string()]
}

impl Default for MonitorNodeConfig {
    fn default() -> Self {
        Self {
            topics: default_monitor_topics(),
            watch_frames: false,
            frame_topic: default_frame_topic(),
            snapshot_path: None,
        }
    }
}

impl MonitorNodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topics.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one topic is required".to_string(),
            ));
        }
        for topic in &self.topics {
            check_topic(topic)?;
        }
        if self.snapshot_path.is_some() && !self.watch_frames {
            return Err(ConfigError::ValidationError(
                "snapshot_path requires watch_frames".to_string(),
            ));
        }
        check_topic(&self.frame_topic)
    }
}

fn check_topic(topic: &str) -> Result<(), ConfigError> {
    validate_topic(topic).map_err(|e| ConfigError::ValidationError(e.to_string()))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    ValidationError(String),
}
