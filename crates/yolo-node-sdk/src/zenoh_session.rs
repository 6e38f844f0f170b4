use std::sync::Arc;

const DEFAULT_ENDPOINT: &str = "tcp/127.0.0.1:7447";

/// How the node attaches to the Zenoh network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Route everything through a zenohd router.
    Client,
    /// Talk to other peers directly (the endpoint is still dialled).
    Peer,
}

impl SessionMode {
    fn as_json5(self) -> &'static str {
        match self {
            SessionMode::Client => r#""client""#,
            SessionMode::Peer => r#""peer""#,
        }
    }
}

/// Resolve the endpoint to connect to.
///
/// Resolution order:
/// 1. `ZENOH_ENDPOINT` env var
/// 2. `YOLO_ZENOH_ENDPOINT` env var
/// 3. Provided `endpoint` argument
/// 4. Default: `tcp/127.0.0.1:7447`
pub fn resolve_endpoint(endpoint: &Option<String>) -> String {
    std::env::var("ZENOH_ENDPOINT")
        .or_else(|_| std::env::var("YOLO_ZENOH_ENDPOINT"))
        .ok()
        .or_else(|| endpoint.clone())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

pub(crate) fn session_config(endpoint: &str, mode: SessionMode) -> anyhow::Result<zenoh::Config> {
    let mut config = zenoh::Config::default();
    config
        .insert_json5("mode", mode.as_json5())
        .map_err(|e| anyhow::anyhow!("Failed to set Zenoh mode: {}", e))?;
    config
        .insert_json5("connect/endpoints", &format!(r#"["{}"]"#, endpoint))
        .map_err(|e| anyhow::anyhow!("Failed to set Zenoh endpoint: {}", e))?;
    // Only the explicit endpoint; no multicast or gossip discovery
    config
        .insert_json5("scouting/multicast/enabled", "false")
        .map_err(|e| anyhow::anyhow!("Failed to disable multicast: {}", e))?;
    config
        .insert_json5("scouting/gossip/enabled", "false")
        .map_err(|e| anyhow::anyhow!("Failed to disable gossip: {}", e))?;
    Ok(config)
}

/// Open a Zenoh session against `endpoint`.
pub async fn open_zenoh_session(
    endpoint: &str,
    mode: SessionMode,
) -> anyhow::Result<Arc<zenoh::Session>> {
    log::info!("Connecting to Zenoh at: {} ({:?} mode)", endpoint, mode);

    let config = session_config(endpoint, mode)?;
    let session = zenoh::open(config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open Zenoh session: {}", e))?;

    log::info!("Connected to Zenoh");
    Ok(Arc::new(session))
}
