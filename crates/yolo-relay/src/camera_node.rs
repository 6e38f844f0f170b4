use crate::bus::ZenohOutlet;
use crate::camera_relay::{CameraRelay, RelayOutcome, SourceOpener};
use crate::config::CameraNodeConfig;
use crate::source::open_camera;
use yolo_node_sdk::{Node, NodeContext};

/// Camera node: captures from a device or stream, publishes JPEG frames, and
/// switches source when a new address arrives.
pub struct CameraNode {
    relay: CameraRelay<ZenohOutlet>,
    // Dropping the handle undeclares the subscription
    _address_sub: Option<zenoh::pubsub::Subscriber<()>>,
}

#[async_trait::async_trait]
impl Node for CameraNode {
    type Config = CameraNodeConfig;

    fn name() -> &'static str {
        "camera"
    }

    async fn init(ctx: &NodeContext, config: &CameraNodeConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let source = match config.source_address() {
            Some(address) => {
                log::info!("Opening camera '{}'", address);
                Some(open_camera(&address, config.capture_timeout())?)
            }
            None => {
                log::info!("No camera configured, waiting for camera address");
                None
            }
        };

        let outlet = ZenohOutlet::declare(&ctx.session, &config.frame_topic).await?;
        log::info!(
            "Camera publishing to '{}' at {} fps (quality {})",
            config.frame_topic,
            config.fps,
            config.jpeg_quality
        );

        let mut relay = CameraRelay::new(source, outlet, config.fps, config.jpeg_quality);

        let address_sub = match &config.address_topic {
            Some(topic) => {
                let (tx, rx) = flume::unbounded::<String>();
                let sub = ctx
                    .session
                    .declare_subscriber(topic.clone())
                    .callback(move |sample| {
                        let payload = sample.payload().to_bytes();
                        match std::str::from_utf8(&payload) {
                            Ok(address) => {
                                let _ = tx.send(address.to_string());
                            }
                            Err(e) => log::warn!("Ignoring non UTF-8 camera address: {}", e),
                        }
                    })
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to subscribe to '{}': {}", topic, e))?;
                log::info!("Listening for camera address updates on '{}'", topic);

                let timeout = config.capture_timeout();
                let opener: SourceOpener = Box::new(move |address: &str| open_camera(address, timeout));
                relay = relay.with_reopen(rx, opener);
                Some(sub)
            }
            None => None,
        };

        Ok(Self {
            relay,
            _address_sub: address_sub,
        })
    }

    async fn run(self, ctx: NodeContext) -> anyhow::Result<()> {
        match self.relay.run(ctx.shutdown_rx.clone()).await {
            RelayOutcome::CaptureFailed(reason) => {
                Err(anyhow::anyhow!("failed to capture frame: {}", reason))
            }
            RelayOutcome::Shutdown | RelayOutcome::SourceEnded => Ok(()),
        }
    }
}
