use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(5);

/// One health beat, published as JSON on `nodes/{machine_id}/{node}/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub status: String,
    pub node: String,
    pub machine_id: String,
    /// Beats sent before this one
    pub seq: u64,
    pub uptime_secs: u64,
}

/// Periodic health publisher for one node.
pub(crate) struct HealthHeartbeat {
    topic: String,
    node: String,
    machine_id: String,
    period: Duration,
}

impl HealthHeartbeat {
    pub(crate) fn new(node: &str, machine_id: &str, period: Duration) -> Self {
        Self {
            topic: crate::context::health_topic(machine_id, node),
            node: node.to_string(),
            machine_id: machine_id.to_string(),
            // tokio::time::interval panics on a zero period
            period: period.max(Duration::from_millis(1)),
        }
    }

    fn beat(&self, seq: u64, started: Instant) -> Heartbeat {
        Heartbeat {
            status: "ok".to_string(),
            node: self.node.clone(),
            machine_id: self.machine_id.clone(),
            seq,
            uptime_secs: started.elapsed().as_secs(),
        }
    }

    /// Publish a beat every period until shutdown fires. The task yields the
    /// number of beats published.
    pub(crate) async fn spawn(
        self,
        session: Arc<zenoh::Session>,
        mut shutdown_rx: watch::Receiver<()>,
    ) -> anyhow::Result<tokio::task::JoinHandle<u64>> {
        log::info!("Health heartbeat: {} every {:?}", self.topic, self.period);
        let publisher = session
            .declare_publisher(self.topic.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create health publisher: {}", e))?;

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(self.period);
            let mut sent = 0u64;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {
                        let payload = match serde_json::to_vec(&self.beat(sent, started)) {
                            Ok(payload) => payload,
                            Err(e) => {
                                log::warn!("Health heartbeat encode failed: {}", e);
                                continue;
                            }
                        };
                        match publisher.put(payload).await {
                            Ok(()) => sent += 1,
                            Err(e) => log::warn!("Health heartbeat failed: {}", e),
                        }
                    }
                }
            }
            log::debug!("Health heartbeat stopping after {} beats", sent);
            sent
        });

        Ok(handle)
    }
}
