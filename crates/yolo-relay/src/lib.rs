//! Camera frame relay and YOLO detection result distribution over Zenoh.
//!
//! Frames flow `CameraRelay → camera/frame → FrameSubscriber → FrameCache →
//! DetectionDriver → ResultPublisher → yolo/detection/results`. Each stage is
//! usable on its own; the `*_node` modules wire them into SDK nodes.

pub mod bus;
pub mod camera_relay;
pub mod config;
pub mod detection;
pub mod detector;
pub mod driver;
pub mod frame;
pub mod frame_cache;
pub mod frame_subscriber;
pub mod monitor;
pub mod result_publisher;
pub mod source;

#[cfg(feature = "gstreamer")]
pub mod capture;

#[cfg(feature = "gstreamer")]
pub mod camera_node;
pub mod detector_node;
pub mod monitor_node;

pub use bus::{BusError, Outlet, ZenohOutlet};
pub use camera_relay::{CameraRelay, RelayOutcome};
pub use detection::{ClassLabels, DetectionResult};
pub use detector::{Detector, DetectorError};
pub use driver::{DetectionDriver, DriverOutcome, FrameFeed, RetryState};
pub use frame::{Frame, FrameError};
pub use frame_cache::FrameCache;
pub use frame_subscriber::FrameSubscriber;
pub use result_publisher::ResultPublisher;
pub use source::{CaptureError, FrameSource, SourceType};
