//! Test helpers for Zenoh integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use yolo_relay::{CaptureError, Frame, FrameSource};
use zenoh::Session;

/// Router used by the `#[ignore]`d tests (`zenohd` on the default port)
pub const ROUTER_ENDPOINT: &str = "tcp/127.0.0.1:7447";

/// Route `log` output through the test harness (`RUST_LOG=debug` to see it).
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Standalone peer session listening on loopback only.
///
/// Publishers and subscribers declared on the same session reach each other
/// without a router, which is enough to exercise the relay and the subscriber.
pub async fn local_session() -> Arc<Session> {
    let mut config = zenoh::Config::default();
    config.insert_json5("mode", "\"peer\"").unwrap();
    config
        .insert_json5("listen/endpoints", "[\"tcp/127.0.0.1:0\"]")
        .unwrap();
    config
        .insert_json5("scouting/multicast/enabled", "false")
        .unwrap();
    config.insert_json5("scouting/gossip/enabled", "false").unwrap();
    Arc::new(zenoh::open(config).await.unwrap())
}

/// Client session attached to a running zenohd.
pub async fn router_session() -> Arc<Session> {
    yolo_node_sdk::open_zenoh_session(ROUTER_ENDPOINT, yolo_node_sdk::SessionMode::Client)
        .await
        .unwrap()
}

/// Poll `condition` every 10 ms until it holds or `limit` passes.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// A solid-colour RGB frame
pub fn solid_frame(width: u32, height: u32, value: u8) -> Frame {
    Frame::new(width, height, 3, vec![value; (width * height * 3) as usize]).unwrap()
}

/// Endless synthetic camera
pub struct TestPattern {
    pub width: u32,
    pub height: u32,
    pub tick: u8,
}

impl FrameSource for TestPattern {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        self.tick = self.tick.wrapping_add(1);
        Ok(Some(solid_frame(self.width, self.height, self.tick)))
    }
}
