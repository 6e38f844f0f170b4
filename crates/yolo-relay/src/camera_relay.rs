use crate::bus::Outlet;
use crate::source::{CaptureError, FrameSource};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Opens a fresh source for a new camera address.
pub type SourceOpener =
    Box<dyn FnMut(&str) -> Result<Box<dyn FrameSource>, CaptureError> + Send>;

/// Why the relay loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Shutdown was requested
    Shutdown,
    /// The source ended (end of file, closed stream)
    SourceEnded,
    /// The device stopped producing frames
    CaptureFailed(String),
}

/// Sleep needed after an iteration that took `elapsed` to hold `period`.
pub fn pace_delay(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

/// Capture → encode → publish at a fixed rate.
///
/// The per-iteration sleep shrinks by however long capture and encode took,
/// so the publish cadence tracks the configured rate.
pub struct CameraRelay<O: Outlet> {
    source: Option<Box<dyn FrameSource>>,
    outlet: O,
    period: Duration,
    jpeg_quality: u8,
    reopen: Option<(flume::Receiver<String>, SourceOpener)>,
    published: u64,
    skipped: u64,
    last_log: Instant,
}

impl<O: Outlet> CameraRelay<O> {
    /// Without a source the relay idles until an address update opens one.
    pub fn new(
        source: Option<Box<dyn FrameSource>>,
        outlet: O,
        fps: f64,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            source,
            outlet,
            period: Duration::from_secs_f64(1.0 / fps.max(0.001)),
            jpeg_quality,
            reopen: None,
            published: 0,
            skipped: 0,
            last_log: Instant::now(),
        }
    }

    /// Re-open the source whenever a new address arrives on `addresses`.
    pub fn with_reopen(mut self, addresses: flume::Receiver<String>, opener: SourceOpener) -> Self {
        self.reopen = Some((addresses, opener));
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    /// Run until shutdown or capture failure. The source is released on every path.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<()>) -> RelayOutcome {
        let outcome = self.relay_loop(&mut shutdown_rx).await;

        if let Some(mut source) = self.source.take() {
            source.release();
        }

        match &outcome {
            RelayOutcome::Shutdown => log::info!("[relay] stopped by shutdown request"),
            RelayOutcome::SourceEnded => log::info!("[relay] source ended"),
            // Reported by the caller
            RelayOutcome::CaptureFailed(reason) => {
                log::debug!("[relay] failed to capture frame: {}", reason)
            }
        }
        log::info!(
            "[relay] {} frames published, {} skipped",
            self.published,
            self.skipped
        );
        outcome
    }

    async fn relay_loop(&mut self, shutdown_rx: &mut watch::Receiver<()>) -> RelayOutcome {
        loop {
            if yolo_node_sdk::is_shutdown(shutdown_rx) {
                return RelayOutcome::Shutdown;
            }
            self.apply_address_update();

            let started = Instant::now();
            match self.source.as_mut() {
                Some(source) => match source.next_frame() {
                    Ok(Some(frame)) => match frame.encode_jpeg(self.jpeg_quality) {
                        Ok(jpeg) => self.publish(jpeg).await,
                        Err(e) => {
                            self.skipped += 1;
                            log::warn!("[relay] failed to encode frame: {}", e);
                        }
                    },
                    Ok(None) => return RelayOutcome::SourceEnded,
                    Err(e) => return RelayOutcome::CaptureFailed(e.to_string()),
                },
                // Waiting for the first address, or a usable one after a failed re-open
                None => log::trace!("[relay] no open source"),
            }

            let delay = pace_delay(self.period, started.elapsed());
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => return RelayOutcome::Shutdown,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn publish(&mut self, jpeg: Vec<u8>) {
        let len = jpeg.len();
        match self.outlet.put(jpeg).await {
            Ok(()) => self.published += 1,
            Err(e) => {
                self.skipped += 1;
                log::warn!("[relay] publish on '{}' failed: {}", self.outlet.key(), e);
            }
        }

        if self.last_log.elapsed() >= Duration::from_secs(1) {
            log::info!(
                "[relay] {} published, {} skipped (last frame {} bytes)",
                self.published,
                self.skipped,
                len
            );
            self.last_log = Instant::now();
        }
    }

    fn apply_address_update(&mut self) {
        let Some((addresses, opener)) = self.reopen.as_mut() else {
            return;
        };
        // Only the newest address matters
        let Some(address) = addresses.try_iter().filter(|a| !a.trim().is_empty()).last() else {
            return;
        };

        log::info!("[relay] camera address update: {}", address);
        if let Some(mut old) = self.source.take() {
            old.release();
        }
        match opener(address.trim()) {
            Ok(source) => self.source = Some(source),
            Err(e) => log::error!("[relay] failed to open '{}': {}", address, e),
        }
    }
}
