use crate::bus::ZenohOutlet;
use crate::config::DetectorNodeConfig;
use crate::detection::ClassLabels;
use crate::detector::{load_model, BoxedDetector};
use crate::driver::{DetectionDriver, DriverOutcome, FrameFeed};
use crate::frame_cache::FrameCache;
use crate::frame_subscriber::FrameSubscriber;
use crate::result_publisher::ResultPublisher;
use crate::source::{open_static_source, SourceType};
use yolo_node_sdk::{Node, NodeContext};

/// Detector node: runs the model over an image, a video, or the live frame
/// topic, and publishes one result per processed frame.
pub struct DetectorNode {
    driver: DetectionDriver<BoxedDetector, ZenohOutlet>,
    // Live mode only; keeps the cache fed until the node returns
    subscriber: Option<FrameSubscriber>,
}

#[async_trait::async_trait]
impl Node for DetectorNode {
    type Config = DetectorNodeConfig;

    fn name() -> &'static str {
        "detector"
    }

    async fn init(ctx: &NodeContext, config: &DetectorNodeConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let detector = load_model(&config.model)?;
        let labels = config
            .labels
            .clone()
            .map(ClassLabels::new)
            .unwrap_or_default();

        let outlet = ZenohOutlet::declare(&ctx.session, &config.result_topic).await?;
        let publisher = ResultPublisher::new(outlet, labels);

        let (feed, subscriber) = match config.source_type {
            SourceType::Camera => {
                let cache = FrameCache::new();
                let subscriber =
                    FrameSubscriber::declare(&ctx.session, &config.frame_topic, cache.clone())
                        .await?;
                (FrameFeed::Live(cache), Some(subscriber))
            }
            static_type => {
                let path = config.source_path()?;
                log::info!("Detector reading {} '{}'", static_type, path.display());
                let source = open_static_source(static_type, path)?;
                (FrameFeed::Static(source), None)
            }
        };

        log::info!("Detector publishing results to '{}'", config.result_topic);

        let driver = DetectionDriver::new(detector, feed, publisher)
            .with_polling(config.poll_interval(), config.max_retries);

        Ok(Self { driver, subscriber })
    }

    async fn run(self, ctx: NodeContext) -> anyhow::Result<()> {
        let Self {
            mut driver,
            subscriber,
        } = self;

        let outcome = driver.run(ctx.shutdown_rx.clone()).await;

        if let Some(subscriber) = &subscriber {
            log::info!(
                "Frames on '{}': {} decoded, {} dropped",
                subscriber.topic(),
                subscriber.stats().decoded(),
                subscriber.stats().dropped()
            );
        }

        match outcome {
            DriverOutcome::SourceFailed(reason) => {
                Err(anyhow::anyhow!("frame source failed: {}", reason))
            }
            // Running out of frames is a clean exit
            DriverOutcome::SourceExhausted
            | DriverOutcome::NoFramesReceived
            | DriverOutcome::Shutdown => Ok(()),
        }
    }
}
