use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Version written into every result payload.
pub const RESULT_SCHEMA_VERSION: u32 = 1;

/// Labels for the 22 classes the bundled model was trained on (logging only).
pub const DEFAULT_CLASS_LABELS: [&str; 22] = [
    "student_card",
    "teacher_card",
    "card_front",
    "card_back",
    "photo",
    "name",
    "neptun_code",
    "card_id",
    "barcode",
    "qr_code",
    "logo",
    "hologram",
    "signature",
    "expiry_date",
    "person",
    "face",
    "hand",
    "phone",
    "laptop",
    "book",
    "cup",
    "keyboard",
];

#[derive(Debug, Error)]
pub enum ResultDecodeError {
    #[error("result payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported result schema version {0}")]
    UnsupportedVersion(u32),
    #[error("object_count {count} does not match {listed} listed objects")]
    CountMismatch { count: usize, listed: usize },
}

/// Class ids found in one frame. The count is always derived from the ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionResult {
    class_ids: Vec<u32>,
}

#[derive(Serialize, Deserialize)]
struct ResultWire {
    // Payloads from publishers that predate versioning carry no field
    #[serde(default = "unversioned")]
    schema_version: u32,
    object_count: usize,
    detected_objects: Vec<u32>,
}

fn unversioned() -> u32 {
    1
}

impl DetectionResult {
    pub fn new(class_ids: Vec<u32>) -> Self {
        Self { class_ids }
    }

    pub fn object_count(&self) -> usize {
        self.class_ids.len()
    }

    pub fn class_ids(&self) -> &[u32] {
        &self.class_ids
    }

    pub fn is_empty(&self) -> bool {
        self.class_ids.is_empty()
    }

    /// Occurrences per class id, ordered by id.
    pub fn counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for id in &self.class_ids {
            *counts.entry(*id).or_insert(0) += 1;
        }
        counts
    }

    /// JSON payload: `{"schema_version":1,"object_count":n,"detected_objects":[...]}`
    pub fn to_payload(&self) -> Vec<u8> {
        let wire = ResultWire {
            schema_version: RESULT_SCHEMA_VERSION,
            object_count: self.object_count(),
            detected_objects: self.class_ids.clone(),
        };
        // Serializing integers into a Vec cannot fail
        serde_json::to_vec(&wire).unwrap_or_default()
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, ResultDecodeError> {
        let wire: ResultWire = serde_json::from_slice(payload)?;
        if wire.schema_version > RESULT_SCHEMA_VERSION {
            return Err(ResultDecodeError::UnsupportedVersion(wire.schema_version));
        }
        if wire.object_count != wire.detected_objects.len() {
            return Err(ResultDecodeError::CountMismatch {
                count: wire.object_count,
                listed: wire.detected_objects.len(),
            });
        }
        Ok(Self::new(wire.detected_objects))
    }

    /// Human-readable one-liner, e.g. `3 objects: person x2, barcode x1`.
    pub fn summary(&self, labels: &ClassLabels) -> String {
        if self.is_empty() {
            return "No objects detected".to_string();
        }
        let parts: Vec<String> = self
            .counts()
            .into_iter()
            .map(|(id, n)| format!("{} x{}", labels.label(id), n))
            .collect();
        format!("{} objects: {}", self.object_count(), parts.join(", "))
    }
}

/// Class id → label lookup.
#[derive(Debug, Clone)]
pub struct ClassLabels {
    labels: Vec<String>,
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self::new(DEFAULT_CLASS_LABELS.iter().map(|l| l.to_string()).collect())
    }
}

impl ClassLabels {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, id: u32) -> String {
        self.labels
            .get(id as usize)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip() {
        let result = DetectionResult::new(vec![6, 14, 14]);
        let decoded = DetectionResult::from_payload(&result.to_payload()).unwrap();
        assert_eq!(decoded.object_count(), 3);
        assert_eq!(decoded.class_ids(), &[6, 14, 14]);
    }

    #[test]
    fn test_payload_shape() {
        let json: serde_json::Value =
            serde_json::from_slice(&DetectionResult::new(vec![6, 14, 14]).to_payload()).unwrap();
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["object_count"], 3);
        assert_eq!(json["detected_objects"], serde_json::json!([6, 14, 14]));
    }

    #[test]
    fn test_empty_result() {
        let result = DetectionResult::new(vec![]);
        let json: serde_json::Value = serde_json::from_slice(&result.to_payload()).unwrap();
        assert_eq!(json["object_count"], 0);
        assert_eq!(result.summary(&ClassLabels::default()), "No objects detected");
    }

    #[test]
    fn test_unversioned_payload_is_accepted() {
        let decoded =
            DetectionResult::from_payload(br#"{"object_count": 2, "detected_objects": [1, 4]}"#)
                .unwrap();
        assert_eq!(decoded.class_ids(), &[1, 4]);
    }

    #[test]
    fn test_newer_version_and_bad_count_rejected() {
        let newer = br#"{"schema_version": 2, "object_count": 0, "detected_objects": []}"#;
        assert!(matches!(
            DetectionResult::from_payload(newer),
            Err(ResultDecodeError::UnsupportedVersion(2))
        ));

        let bad = br#"{"object_count": 5, "detected_objects": [1]}"#;
        assert!(matches!(
            DetectionResult::from_payload(bad),
            Err(ResultDecodeError::CountMismatch { count: 5, listed: 1 })
        ));

        assert!(matches!(
            DetectionResult::from_payload(b"training started"),
            Err(ResultDecodeError::Json(_))
        ));
    }

    #[test]
    fn test_summary_groups_by_label() {
        let labels = ClassLabels::default();
        assert_eq!(labels.len(), 22);
        let summary = DetectionResult::new(vec![14, 8, 14]).summary(&labels);
        assert_eq!(summary, "3 objects: barcode x1, person x2");
        assert_eq!(labels.label(99), "class_99");
    }
}
