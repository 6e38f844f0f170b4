use crate::bus::topic_matches;
use crate::config::MonitorNodeConfig;
use crate::detection::ClassLabels;
use crate::monitor::{classify, MonitorMessage};
use std::path::PathBuf;
use yolo_node_sdk::{Node, NodeContext};
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::Subscriber;
use zenoh::sample::Sample;

/// Monitor node: logs everything published under the watched topics
/// (detection results, training progress) and optionally camera frames.
pub struct MonitorNode {
    subscribers: Vec<Subscriber<FifoChannelHandler<Sample>>>,
    frame_topic: Option<String>,
    snapshot_path: Option<PathBuf>,
}

#[async_trait::async_trait]
impl Node for MonitorNode {
    type Config = MonitorNodeConfig;

    fn name() -> &'static str {
        "monitor"
    }

    async fn init(ctx: &NodeContext, config: &MonitorNodeConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let mut topics = config.topics.clone();
        let frame_topic = config.watch_frames.then(|| config.frame_topic.clone());
        if let Some(frame_topic) = &frame_topic {
            if !topics.iter().any(|t| topic_matches(t, frame_topic)) {
                topics.push(frame_topic.clone());
            }
        }

        let mut subscribers = Vec::with_capacity(topics.len());
        for topic in &topics {
            let subscriber = ctx
                .session
                .declare_subscriber(topic.clone())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to subscribe to '{}': {}", topic, e))?;
            log::info!("[monitor] listening on '{}'", topic);
            subscribers.push(subscriber);
        }

        Ok(Self {
            subscribers,
            frame_topic,
            snapshot_path: config.snapshot_path.clone(),
        })
    }

    async fn run(self, ctx: NodeContext) -> anyhow::Result<()> {
        let mut handles = Vec::new();
        for subscriber in self.subscribers {
            let watcher = TopicWatcher {
                frame_topic: self.frame_topic.clone(),
                snapshot_path: self.snapshot_path.clone(),
                labels: ClassLabels::default(),
            };
            handles.push(tokio::spawn(watcher.run(subscriber, ctx.shutdown_rx.clone())));
        }

        for handle in handles {
            let _ = handle.await;
        }
        log::info!("[monitor] all subscribers stopped");
        Ok(())
    }
}

struct TopicWatcher {
    frame_topic: Option<String>,
    snapshot_path: Option<PathBuf>,
    labels: ClassLabels,
}

impl TopicWatcher {
    async fn run(
        self,
        subscriber: Subscriber<FifoChannelHandler<Sample>>,
        mut shutdown_rx: tokio::sync::watch::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => break,

                sample = subscriber.recv_async() => match sample {
                    Ok(sample) => self.handle(&sample),
                    Err(_) => break,
                },
            }
        }
    }

    fn handle(&self, sample: &Sample) {
        let key = sample.key_expr().as_str();
        let payload = sample.payload().to_bytes();
        let is_frame = self
            .frame_topic
            .as_deref()
            .is_some_and(|frame_topic| topic_matches(frame_topic, key));

        let message = classify(&payload, is_frame);
        match &message {
            MonitorMessage::Invalid(_) => {
                log::warn!("[monitor] {}: {}", key, message.describe(&self.labels))
            }
            _ => log::info!("[monitor] {}: {}", key, message.describe(&self.labels)),
        }

        if let (MonitorMessage::Frame { .. }, Some(path)) = (&message, &self.snapshot_path) {
            if let Err(e) = std::fs::write(path, &payload) {
                log::warn!("[monitor] failed to write snapshot {}: {}", path.display(), e);
            }
        }
    }
}
