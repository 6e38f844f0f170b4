use crate::bus::Outlet;
use crate::detection::{ClassLabels, DetectionResult};

/// Serializes detection results onto the result topic.
///
/// Fire-and-forget: a failed put is logged and reported as `false`, never
/// raised, because a lost result does not affect the driver.
pub struct ResultPublisher<O: Outlet> {
    outlet: O,
    labels: ClassLabels,
    published: u64,
    failed: u64,
}

impl<O: Outlet> ResultPublisher<O> {
    pub fn new(outlet: O, labels: ClassLabels) -> Self {
        Self {
            outlet,
            labels,
            published: 0,
            failed: 0,
        }
    }

    pub async fn publish(&mut self, result: &DetectionResult) -> bool {
        log::info!("[publisher] {}", result.summary(&self.labels));

        match self.outlet.put(result.to_payload()).await {
            Ok(()) => {
                self.published += 1;
                true
            }
            Err(e) => {
                self.failed += 1;
                log::warn!("[publisher] result on '{}' dropped: {}", self.outlet.key(), e);
                false
            }
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn outlet(&self) -> &O {
        &self.outlet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::RecordingOutlet;

    #[tokio::test]
    async fn test_publishes_json_payload() {
        let mut publisher = ResultPublisher::new(RecordingOutlet::default(), ClassLabels::default());
        assert!(publisher.publish(&DetectionResult::new(vec![6, 14, 14])).await);

        let sent = publisher.outlet().payloads();
        assert_eq!(sent.len(), 1);
        let decoded = DetectionResult::from_payload(&sent[0]).unwrap();
        assert_eq!(decoded.object_count(), 3);
        assert_eq!(decoded.class_ids(), &[6, 14, 14]);
    }

    #[tokio::test]
    async fn test_transport_failure_is_swallowed() {
        let mut publisher =
            ResultPublisher::new(RecordingOutlet::failing(), ClassLabels::default());
        assert!(!publisher.publish(&DetectionResult::default()).await);
        assert!(!publisher.publish(&DetectionResult::new(vec![1])).await);
        assert_eq!(publisher.failed(), 2);
        assert_eq!(publisher.published(), 0);
    }
}
