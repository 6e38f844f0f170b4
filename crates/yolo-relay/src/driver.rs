//! Frame → model → result control loop.
//!
//! ```text
//! IDLE → AWAITING_FRAME → DETECTING → PUBLISHING → AWAITING_FRAME
//!              │                                        │
//!              └──────────────→ TERMINATED ←────────────┘
//! ```

use crate::bus::Outlet;
use crate::detection::DetectionResult;
use crate::detector::Detector;
use crate::frame::Frame;
use crate::frame_cache::FrameCache;
use crate::result_publisher::ResultPublisher;
use crate::source::FrameSource;
use std::time::Duration;
use tokio::sync::watch;

pub const DEFAULT_POLL_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_RETRIES: u32 = 50;

/// Consecutive empty polls, bounded by a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    count: u32,
    ceiling: u32,
}

impl RetryState {
    pub fn new(ceiling: u32) -> Self {
        Self {
            count: 0,
            ceiling: ceiling.max(1),
        }
    }

    /// Count one empty poll. Returns true once the ceiling is reached.
    pub fn record_empty(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.count >= self.ceiling
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }
}

/// Where the driver gets frames from.
pub enum FrameFeed {
    /// Image or video file: one pass, then done
    Static(Box<dyn FrameSource>),
    /// Frames arriving on the bus
    Live(FrameCache),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverOutcome {
    /// One-shot source fully processed
    SourceExhausted,
    /// One-shot source failed mid-read
    SourceFailed(String),
    /// Retry ceiling reached before any frame arrived
    NoFramesReceived,
    Shutdown,
}

#[derive(Debug)]
pub enum DriverState {
    Idle,
    AwaitingFrame,
    Detecting(Frame),
    Publishing(DetectionResult),
    Terminated(DriverOutcome),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriverStats {
    pub frames: u64,
    pub published: u64,
    pub empty_polls: u64,
    /// Polls that only found the frame already processed
    pub stale_polls: u64,
    pub detect_failures: u64,
}

pub struct DetectionDriver<D: Detector, O: Outlet> {
    detector: D,
    feed: FrameFeed,
    publisher: ResultPublisher<O>,
    retry: RetryState,
    poll_delay: Duration,
    // Generation of the last cached frame handed to the detector
    seen: u64,
    stats: DriverStats,
}

impl<D: Detector, O: Outlet> DetectionDriver<D, O> {
    pub fn new(detector: D, feed: FrameFeed, publisher: ResultPublisher<O>) -> Self {
        Self {
            detector,
            feed,
            publisher,
            retry: RetryState::new(DEFAULT_MAX_RETRIES),
            poll_delay: DEFAULT_POLL_DELAY,
            seen: 0,
            stats: DriverStats::default(),
        }
    }

    pub fn with_polling(mut self, poll_delay: Duration, max_retries: u32) -> Self {
        self.poll_delay = poll_delay;
        self.retry = RetryState::new(max_retries);
        self
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn publisher(&self) -> &ResultPublisher<O> {
        &self.publisher
    }

    /// Drive the state machine until it terminates.
    pub async fn run(&mut self, mut shutdown_rx: watch::Receiver<()>) -> DriverOutcome {
        let mut state = DriverState::Idle;
        let outcome = loop {
            state = match state {
                DriverState::Idle => {
                    match &self.feed {
                        FrameFeed::Static(_) => log::info!("[driver] processing static source"),
                        FrameFeed::Live(_) => log::info!(
                            "[driver] polling frame cache every {:?} (ceiling {})",
                            self.poll_delay,
                            self.retry.ceiling()
                        ),
                    }
                    DriverState::AwaitingFrame
                }
                DriverState::AwaitingFrame => self.await_frame(&mut shutdown_rx).await,
                DriverState::Detecting(frame) => {
                    self.stats.frames += 1;
                    match self.detector.detect(&frame) {
                        Ok(class_ids) => DriverState::Publishing(DetectionResult::new(class_ids)),
                        Err(e) => {
                            self.stats.detect_failures += 1;
                            log::warn!("[driver] detection failed, skipping frame: {}", e);
                            DriverState::AwaitingFrame
                        }
                    }
                }
                DriverState::Publishing(result) => {
                    if self.publisher.publish(&result).await {
                        self.stats.published += 1;
                    }
                    // Static feeds never sleep; let other tasks run between frames
                    tokio::task::yield_now().await;
                    DriverState::AwaitingFrame
                }
                DriverState::Terminated(outcome) => break outcome,
            };
        };

        if let FrameFeed::Static(source) = &mut self.feed {
            source.release();
        }

        match &outcome {
            DriverOutcome::SourceExhausted => log::info!("[driver] source exhausted"),
            // Reported by the caller
            DriverOutcome::SourceFailed(reason) => {
                log::debug!("[driver] source read failed: {}", reason)
            }
            DriverOutcome::NoFramesReceived => log::warn!(
                "[driver] no frames received after {} polls, stopping",
                self.retry.count()
            ),
            DriverOutcome::Shutdown => log::info!("[driver] stopped by shutdown request"),
        }
        log::info!(
            "[driver] {} frames processed, {} results published, {} empty polls, {} stale polls, {} detection failures",
            self.stats.frames,
            self.stats.published,
            self.stats.empty_polls,
            self.stats.stale_polls,
            self.stats.detect_failures
        );
        outcome
    }

    async fn await_frame(&mut self, shutdown_rx: &mut watch::Receiver<()>) -> DriverState {
        if yolo_node_sdk::is_shutdown(shutdown_rx) {
            return DriverState::Terminated(DriverOutcome::Shutdown);
        }

        let cache = match &mut self.feed {
            FrameFeed::Static(source) => {
                return match source.next_frame() {
                    Ok(Some(frame)) => DriverState::Detecting(frame),
                    Ok(None) => DriverState::Terminated(DriverOutcome::SourceExhausted),
                    Err(e) => DriverState::Terminated(DriverOutcome::SourceFailed(e.to_string())),
                };
            }
            FrameFeed::Live(cache) => cache,
        };

        if let Some((generation, frame)) = cache.read_newer(self.seen) {
            self.seen = generation;
            self.retry.reset();
            return DriverState::Detecting(frame);
        }

        if cache.generation() > 0 {
            // The cache still holds a valid frame, only an empty cache counts
            // toward the ceiling
            self.stats.stale_polls += 1;
            self.retry.reset();
        } else {
            self.stats.empty_polls += 1;
            if self.retry.record_empty() {
                return DriverState::Terminated(DriverOutcome::NoFramesReceived);
            }
            log::debug!(
                "[driver] cache empty ({}/{})",
                self.retry.count(),
                self.retry.ceiling()
            );
        }

        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => DriverState::Terminated(DriverOutcome::Shutdown),
            _ = tokio::time::sleep(self.poll_delay) => DriverState::AwaitingFrame,
        }
    }
}
