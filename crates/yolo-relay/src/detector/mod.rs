//! The model boundary: a frame goes in, class ids come out.

#[cfg(feature = "onnx")]
mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxYoloDetector;

use crate::frame::{Frame, FrameError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("frame conversion failed: {0}")]
    Frame(#[from] FrameError),
    #[error("model error: {0}")]
    Model(String),
    #[error("detector backend not available: {0}")]
    Unavailable(String),
}

/// Opaque detection function. Called once per frame, repeatedly, from the
/// driver task; an empty vector means nothing was found.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<u32>, DetectorError>;
}

impl<F> Detector for F
where
    F: FnMut(&Frame) -> Result<Vec<u32>, DetectorError> + Send,
{
    fn detect(&mut self, frame: &Frame) -> Result<Vec<u32>, DetectorError> {
        self(frame)
    }
}

/// Type-erased detector handed to the driver by the detector node.
pub type BoxedDetector = Box<dyn FnMut(&Frame) -> Result<Vec<u32>, DetectorError> + Send>;

/// Load the configured model.
#[cfg(feature = "onnx")]
pub fn load_model(model: &crate::config::ModelConfig) -> Result<BoxedDetector, DetectorError> {
    let mut detector =
        OnnxYoloDetector::load(&model.path, model.input_size, model.confidence, model.iou)?;
    Ok(Box::new(move |frame: &Frame| detector.detect(frame)))
}

/// Load the configured model.
#[cfg(not(feature = "onnx"))]
pub fn load_model(model: &crate::config::ModelConfig) -> Result<BoxedDetector, DetectorError> {
    Err(DetectorError::Unavailable(format!(
        "cannot load '{}': built without the `onnx` feature",
        model.path.display()
    )))
}
