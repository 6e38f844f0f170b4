use crate::frame::{Frame, FrameError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by frame sources
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open source '{address}': {reason}")]
    Open { address: String, reason: String },
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("{0} sources need the `gstreamer` feature")]
    Unsupported(&'static str),
}

/// Where the detector node gets its frames from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// A single image file, processed once
    Image,
    /// A video file, processed frame by frame until it ends
    Video,
    /// Live frames from the bus, via the frame cache
    #[default]
    Camera,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceType::Image => "image",
            SourceType::Video => "video",
            SourceType::Camera => "camera",
        };
        f.write_str(name)
    }
}

/// Anything that hands out decoded frames one at a time: camera handles,
/// video files, a single image.
pub trait FrameSource: Send {
    /// Next frame, `Ok(None)` once the source has nothing more to give.
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Release the underlying device. Called once on every exit path; must be idempotent.
    fn release(&mut self) {}
}

/// A single still image; yields it once.
pub struct ImageSource {
    path: PathBuf,
    frame: Option<Frame>,
}

impl ImageSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_path_buf();
        let image = image::open(&path).map_err(|e| CaptureError::Open {
            address: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let frame = Frame::from_rgb_image(image.into_rgb8());
        log::info!(
            "Opened image {} ({}x{})",
            path.display(),
            frame.width(),
            frame.height()
        );
        Ok(Self {
            path,
            frame: Some(frame),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for ImageSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        Ok(self.frame.take())
    }
}

/// Open a one-shot source for the detector: a still image or a video file.
pub fn open_static_source(
    source_type: SourceType,
    path: &Path,
) -> Result<Box<dyn FrameSource>, CaptureError> {
    match source_type {
        SourceType::Image => Ok(Box::new(ImageSource::open(path)?)),
        SourceType::Video => open_video(path),
        SourceType::Camera => Err(CaptureError::Open {
            address: path.display().to_string(),
            reason: "camera frames come from the bus, not a file".to_string(),
        }),
    }
}

#[cfg(feature = "gstreamer")]
fn open_video(path: &Path) -> Result<Box<dyn FrameSource>, CaptureError> {
    use crate::capture::{CaptureTarget, GstSource};
    let target = CaptureTarget::File(path.display().to_string());
    // Files never stall the way live cameras do; a generous pull timeout
    Ok(Box::new(GstSource::open(target, std::time::Duration::from_secs(10))?))
}

#[cfg(not(feature = "gstreamer"))]
fn open_video(_path: &Path) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::Unsupported("video"))
}

/// Open a live camera by address (device index, stream URL or file).
#[cfg(feature = "gstreamer")]
pub fn open_camera(
    address: &str,
    timeout: std::time::Duration,
) -> Result<Box<dyn FrameSource>, CaptureError> {
    let target = crate::capture::CaptureTarget::parse(address);
    Ok(Box::new(crate::capture::GstSource::open(target, timeout)?))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted source for loop tests: yields the queued frames, then `None`.
    pub struct ScriptedSource {
        pub frames: VecDeque<Frame>,
        pub released: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        pub fn new(count: usize) -> Self {
            Self {
                frames: (0..count)
                    .map(|i| Frame::new(1, 1, 1, vec![i as u8]).unwrap())
                    .collect(),
                released: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            Ok(self.frames.pop_front())
        }

        fn release(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}
