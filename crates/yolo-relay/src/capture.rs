//! GStreamer-backed frame sources: V4L2 devices, network streams, video files.

use crate::frame::Frame;
use crate::source::{CaptureError, FrameSource};
use gstreamer::prelude::*;
use std::time::Duration;

/// What a capture pipeline reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    /// Local V4L2 device index (`/dev/video{n}`)
    Device(u32),
    /// Network stream (`rtsp://`, `http://`, ...)
    Url(String),
    /// Video file on disk
    File(String),
}

impl CaptureTarget {
    /// Interpret a camera address the way operators type it: a bare number is
    /// a device index, anything with a scheme is a URL, the rest is a file.
    pub fn parse(address: &str) -> Self {
        let address = address.trim();
        if let Ok(index) = address.parse::<u32>() {
            CaptureTarget::Device(index)
        } else if address.contains("://") {
            CaptureTarget::Url(address.to_string())
        } else {
            CaptureTarget::File(address.to_string())
        }
    }

    fn is_live(&self) -> bool {
        !matches!(self, CaptureTarget::File(_))
    }

    /// Pipeline description ending in an RGB appsink named `sink`.
    ///
    /// Live sources keep only the newest buffer; files deliver every frame.
    fn pipeline_description(&self) -> String {
        let input = match self {
            CaptureTarget::Device(index) => format!("v4l2src device=/dev/video{index}"),
            CaptureTarget::Url(url) => format!("uridecodebin uri=\"{url}\""),
            CaptureTarget::File(path) => format!("filesrc location=\"{path}\" ! decodebin"),
        };
        let sink = if self.is_live() {
            "appsink name=sink sync=false max-buffers=1 drop=true"
        } else {
            "appsink name=sink sync=false max-buffers=4 drop=false"
        };
        format!("{input} ! videoconvert ! video/x-raw,format=RGB ! {sink}")
    }

    fn describe(&self) -> String {
        match self {
            CaptureTarget::Device(index) => format!("/dev/video{index}"),
            CaptureTarget::Url(url) => url.clone(),
            CaptureTarget::File(path) => path.clone(),
        }
    }
}

/// Pulls RGB frames out of a GStreamer pipeline.
pub struct GstSource {
    target: CaptureTarget,
    pipeline: gstreamer::Pipeline,
    sink: gstreamer_app::AppSink,
    timeout: Duration,
    released: bool,
}

impl GstSource {
    pub fn open(target: CaptureTarget, timeout: Duration) -> Result<Self, CaptureError> {
        let open_err = |reason: String| CaptureError::Open {
            address: target.describe(),
            reason,
        };

        if !gstreamer::INITIALIZED.load(std::sync::atomic::Ordering::Relaxed) {
            gstreamer::init().map_err(|e| open_err(e.to_string()))?;
        }

        let description = target.pipeline_description();
        log::debug!("Creating pipeline: {}", description);

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| open_err(e.to_string()))?
            .dynamic_cast::<gstreamer::Pipeline>()
            .map_err(|_| open_err("failed to downcast pipeline".to_string()))?;

        let sink = pipeline
            .by_name("sink")
            .ok_or_else(|| open_err("appsink not found".to_string()))?
            .dynamic_cast::<gstreamer_app::AppSink>()
            .map_err(|_| open_err("failed to downcast appsink".to_string()))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| open_err(e.to_string()))?;

        log::info!("Capture opened: {}", target.describe());

        Ok(Self {
            target,
            pipeline,
            sink,
            timeout,
            released: false,
        })
    }

    pub fn target(&self) -> &CaptureTarget {
        &self.target
    }

    fn sample_to_frame(sample: &gstreamer::Sample) -> Result<Frame, CaptureError> {
        let caps = sample
            .caps()
            .ok_or_else(|| CaptureError::Capture("sample has no caps".to_string()))?;
        let info = gstreamer_video::VideoInfo::from_caps(caps)
            .map_err(|e| CaptureError::Capture(e.to_string()))?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| CaptureError::Capture("sample has no buffer".to_string()))?;
        let map = buffer
            .map_readable()
            .map_err(|_| CaptureError::Capture("buffer not readable".to_string()))?;

        let width = info.width() as usize;
        let height = info.height() as usize;
        let stride = info.stride()[0] as usize;
        let row = width * 3;
        let src = map.as_slice();
        if stride < row || src.len() < stride * (height.saturating_sub(1)) + row {
            return Err(CaptureError::Capture(format!(
                "short buffer: {} bytes for {}x{} stride {}",
                src.len(),
                width,
                height,
                stride
            )));
        }

        // Rows may be padded; repack tightly
        let mut data = Vec::with_capacity(row * height);
        for y in 0..height {
            data.extend_from_slice(&src[y * stride..y * stride + row]);
        }
        Ok(Frame::new(info.width(), info.height(), 3, data)?)
    }
}

impl FrameSource for GstSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let timeout = gstreamer::ClockTime::from_mseconds(self.timeout.as_millis() as u64);
        match self.sink.try_pull_sample(timeout) {
            Some(sample) => Self::sample_to_frame(&sample).map(Some),
            None if self.sink.is_eos() => Ok(None),
            None => Err(CaptureError::Capture(format!(
                "no frame from {} within {:?}",
                self.target.describe(),
                self.timeout
            ))),
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let _ = self.pipeline.send_event(gstreamer::event::Eos::new());
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("Failed to stop capture {}: {}", self.target.describe(), e);
        }
        log::info!("Capture released: {}", self.target.describe());
    }
}

impl Drop for GstSource {
    fn drop(&mut self) {
        self.release();
    }
}
