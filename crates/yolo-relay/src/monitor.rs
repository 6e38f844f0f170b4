//! Turns arbitrary bus messages into one-line log summaries.

use crate::detection::{ClassLabels, DetectionResult};
use crate::frame::Frame;

/// What a message on a monitored topic turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorMessage {
    /// A camera frame that decoded cleanly
    Frame { width: u32, height: u32, bytes: usize },
    /// A detection result payload
    Detection(DetectionResult),
    /// `{"training_status": ...}`
    TrainingStatus(String),
    /// JSON without a known shape
    Json(serde_json::Value),
    /// Anything else that is valid UTF-8
    Text(String),
    /// Could not be interpreted at all
    Invalid(String),
}

/// Classify one message. `is_frame` selects image decoding for frame topics.
pub fn classify(payload: &[u8], is_frame: bool) -> MonitorMessage {
    if is_frame {
        return match Frame::decode(payload) {
            Ok(frame) => MonitorMessage::Frame {
                width: frame.width(),
                height: frame.height(),
                bytes: payload.len(),
            },
            Err(e) => MonitorMessage::Invalid(e.to_string()),
        };
    }

    let text = match std::str::from_utf8(payload) {
        Ok(text) => text,
        Err(e) => return MonitorMessage::Invalid(format!("not UTF-8: {}", e)),
    };

    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return MonitorMessage::Text(text.to_string()),
    };

    if value.get("detected_objects").is_some() {
        match DetectionResult::from_payload(payload) {
            Ok(result) => MonitorMessage::Detection(result),
            Err(e) => MonitorMessage::Invalid(e.to_string()),
        }
    } else if let Some(status) = value.get("training_status") {
        let status = match status {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        MonitorMessage::TrainingStatus(status)
    } else {
        MonitorMessage::Json(value)
    }
}

impl MonitorMessage {
    pub fn describe(&self, labels: &ClassLabels) -> String {
        match self {
            MonitorMessage::Frame {
                width,
                height,
                bytes,
            } => format!("frame {}x{} ({} bytes)", width, height, bytes),
            MonitorMessage::Detection(result) => {
                format!("detection results: {}", result.summary(labels))
            }
            MonitorMessage::TrainingStatus(status) => format!("training status: {}", status),
            MonitorMessage::Json(value) => format!("unknown JSON format: {}", value),
            MonitorMessage::Text(text) => format!("raw message: {}", text),
            MonitorMessage::Invalid(reason) => format!("undecodable message: {}", reason),
        }
    }
}
