//! Topic keys and the publish seam shared by the relay and result publisher.

use async_trait::async_trait;
use thiserror::Error;
use zenoh::key_expr::KeyExpr;

/// Encoded camera frames (JPEG bytes, one message per frame)
pub const FRAME_TOPIC: &str = "camera/frame";
/// Camera source address updates (UTF-8)
pub const CAMERA_ADDRESS_TOPIC: &str = "camera/ip";
/// Detection results (UTF-8 JSON)
pub const RESULT_TOPIC: &str = "yolo/detection/results";
/// Training progress strings
pub const TRAINING_STATUS_TOPIC: &str = "yolo/training/status";
pub const TRAINING_INFO_TOPIC: &str = "yolo/training/info";
pub const TRAINING_MODEL_PATH_TOPIC: &str = "yolo/training/model_path";
/// Everything the YOLO side publishes
pub const YOLO_WILDCARD: &str = "yolo/**";

#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid key expression '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
    #[error("failed to declare publisher on '{key}': {reason}")]
    Declare { key: String, reason: String },
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Validate a topic string as a Zenoh key expression.
pub fn validate_topic(topic: &str) -> Result<(), BusError> {
    KeyExpr::try_from(topic)
        .map(|_| ())
        .map_err(|e| BusError::InvalidKey {
            key: topic.to_string(),
            reason: e.to_string(),
        })
}

/// True when a message published on `topic` would reach a subscriber on `pattern`.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    match (KeyExpr::try_from(pattern), KeyExpr::try_from(topic)) {
        (Ok(pattern), Ok(topic)) => pattern.intersects(&topic),
        _ => false,
    }
}

/// Where encoded payloads go. Implemented by Zenoh publishers and by test sinks.
#[async_trait]
pub trait Outlet: Send + Sync {
    /// Key this outlet publishes on (for logs).
    fn key(&self) -> &str;

    async fn put(&self, payload: Vec<u8>) -> Result<(), BusError>;
}

/// Outlet backed by a declared Zenoh publisher.
pub struct ZenohOutlet {
    key: String,
    publisher: zenoh::pubsub::Publisher<'static>,
}

impl ZenohOutlet {
    pub async fn declare(session: &zenoh::Session, key: &str) -> Result<Self, BusError> {
        validate_topic(key)?;
        let publisher = session
            .declare_publisher(key.to_string())
            .await
            .map_err(|e| BusError::Declare {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            key: key.to_string(),
            publisher,
        })
    }
}

#[async_trait]
impl Outlet for ZenohOutlet {
    fn key(&self) -> &str {
        &self.key
    }

    async fn put(&self, payload: Vec<u8>) -> Result<(), BusError> {
        self.publisher
            .put(payload)
            .await
            .map_err(|e| BusError::Publish(e.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_covers_result_and_training_topics() {
        assert!(topic_matches(YOLO_WILDCARD, RESULT_TOPIC));
        assert!(topic_matches(YOLO_WILDCARD, TRAINING_STATUS_TOPIC));
        assert!(topic_matches(YOLO_WILDCARD, TRAINING_MODEL_PATH_TOPIC));
        assert!(!topic_matches(YOLO_WILDCARD, FRAME_TOPIC));
        assert!(!topic_matches(FRAME_TOPIC, CAMERA_ADDRESS_TOPIC));
    }

    #[test]
    fn test_validate_topic() {
        assert!(validate_topic(FRAME_TOPIC).is_ok());
        assert!(validate_topic("yolo/**").is_ok());
        assert!(validate_topic("").is_err());
        assert!(validate_topic("camera//frame").is_err());
    }
}
