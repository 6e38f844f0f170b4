use super::{Detector, DetectorError};
use crate::frame::Frame;
use image::imageops::FilterType;
use ndarray::{s, Array4, ArrayViewD, Axis, Ix2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;

const LETTERBOX_FILL: f32 = 144.0 / 255.0;

/// Candidate box in model input coordinates.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    class_id: u32,
    confidence: f32,
}

impl Candidate {
    fn iou(&self, other: &Candidate) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        let area_a = (self.x2 - self.x1) * (self.y2 - self.y1);
        let area_b = (other.x2 - other.x1) * (other.y2 - other.y1);
        let union = area_a + area_b - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// YOLO detection model exported to ONNX (`[1, 4 + nc, anchors]` output).
pub struct OnnxYoloDetector {
    session: Session,
    input_size: u32,
    confidence: f32,
    iou: f32,
}

impl OnnxYoloDetector {
    pub fn load(
        model_path: &Path,
        input_size: u32,
        confidence: f32,
        iou: f32,
    ) -> Result<Self, DetectorError> {
        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| {
                DetectorError::Model(format!("failed to load '{}': {}", model_path.display(), e))
            })?;
        log::info!(
            "[detector] loaded ONNX model {} (input {}x{})",
            model_path.display(),
            input_size,
            input_size
        );
        Ok(Self {
            session,
            input_size,
            confidence,
            iou,
        })
    }

    fn preprocess(&self, frame: &Frame) -> Result<Array4<f32>, DetectorError> {
        let rgb = frame.to_rgb_image()?;
        let size = self.input_size;
        let ratio = (size as f32 / rgb.width() as f32).min(size as f32 / rgb.height() as f32);
        let new_w = ((rgb.width() as f32 * ratio).round() as u32).clamp(1, size);
        let new_h = ((rgb.height() as f32 * ratio).round() as u32).clamp(1, size);
        let resized = image::imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);

        let mut input = Array4::from_elem((1, 3, size as usize, size as usize), LETTERBOX_FILL);
        for (x, y, pixel) in resized.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            input[[0, 0, y as usize, x as usize]] = r as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = g as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = b as f32 / 255.0;
        }
        Ok(input)
    }

    fn postprocess(&self, output: ArrayViewD<'_, f32>) -> Result<Vec<u32>, DetectorError> {
        let shape = output.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
            return Err(DetectorError::Model(format!(
                "unexpected output shape {:?}",
                shape
            )));
        }
        let preds = output
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|e| DetectorError::Model(e.to_string()))?;

        let mut candidates = Vec::new();
        for anchor in preds.axis_iter(Axis(1)) {
            let scores = anchor.slice(s![4..]);
            let Some((class_id, &confidence)) = scores
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
            else {
                continue;
            };
            if confidence < self.confidence {
                continue;
            }
            let (cx, cy, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);
            candidates.push(Candidate {
                x1: cx - w / 2.0,
                y1: cy - h / 2.0,
                x2: cx + w / 2.0,
                y2: cy + h / 2.0,
                class_id: class_id as u32,
                confidence,
            });
        }

        Ok(non_max_suppression(candidates, self.iou)
            .into_iter()
            .map(|c| c.class_id)
            .collect())
    }
}

/// Class-aware NMS: a box is dropped only by a stronger box of the same class.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

impl Detector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<u32>, DetectorError> {
        let input = self.preprocess(frame)?;
        let inputs = ort::inputs![input.view()].map_err(|e| DetectorError::Model(e.to_string()))?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| DetectorError::Model(e.to_string()))?;
        let output = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::Model(e.to_string()))?;
        self.postprocess(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x1: f32, class_id: u32, confidence: f32) -> Candidate {
        Candidate {
            x1,
            y1: 0.0,
            x2: x1 + 10.0,
            y2: 10.0,
            class_id,
            confidence,
        }
    }

    #[test]
    fn test_nms_is_class_aware() {
        let kept = non_max_suppression(
            vec![
                candidate(0.0, 6, 0.9),
                candidate(1.0, 6, 0.8),
                candidate(1.0, 14, 0.7),
                candidate(50.0, 6, 0.6),
            ],
            0.45,
        );
        let ids: Vec<u32> = kept.iter().map(|c| c.class_id).collect();
        assert_eq!(ids, vec![6, 14, 6]);
    }
}
