use crate::bus::{validate_topic, BusError};
use crate::frame::Frame;
use crate::frame_cache::FrameCache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Decoded / dropped counters, readable while the subscriber runs
#[derive(Debug, Default)]
pub struct SubscriberStats {
    decoded: AtomicU64,
    dropped: AtomicU64,
}

impl SubscriberStats {
    pub fn decoded(&self) -> u64 {
        self.decoded.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Feeds a [`FrameCache`] from a frame topic.
///
/// Decoding happens on Zenoh's delivery thread; the only effect of a message
/// is a cache write. Undecodable payloads are logged and leave the cached
/// frame as it was.
pub struct FrameSubscriber {
    topic: String,
    stats: Arc<SubscriberStats>,
    // Dropping the handle undeclares the subscription
    _subscriber: zenoh::pubsub::Subscriber<()>,
}

impl FrameSubscriber {
    pub async fn declare(
        session: &zenoh::Session,
        topic: &str,
        cache: FrameCache,
    ) -> Result<Self, BusError> {
        validate_topic(topic)?;
        let stats = Arc::new(SubscriberStats::default());

        let subscriber = session
            .declare_subscriber(topic.to_string())
            .callback({
                let stats = stats.clone();
                move |sample| {
                    let payload = sample.payload().to_bytes();
                    handle_payload(&payload, &cache, &stats);
                }
            })
            .await
            .map_err(|e| BusError::Declare {
                key: topic.to_string(),
                reason: e.to_string(),
            })?;

        log::info!("[subscriber] listening for frames on '{}'", topic);

        Ok(Self {
            topic: topic.to_string(),
            stats,
            _subscriber: subscriber,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn stats(&self) -> &SubscriberStats {
        &self.stats
    }
}

/// Decode one frame message into the cache. Returns whether the cache was written.
pub fn handle_payload(payload: &[u8], cache: &FrameCache, stats: &SubscriberStats) -> bool {
    match Frame::decode(payload) {
        Ok(frame) => {
            log::debug!(
                "[subscriber] frame {}x{} ({} bytes)",
                frame.width(),
                frame.height(),
                payload.len()
            );
            cache.write(frame);
            stats.decoded.fetch_add(1, Ordering::Relaxed);
            true
        }
        Err(e) => {
            log::warn!("[subscriber] dropping frame: {}", e);
            stats.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}
