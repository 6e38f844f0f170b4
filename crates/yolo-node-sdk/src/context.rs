use std::sync::Arc;

/// Context handed to nodes by the SDK runtime.
///
/// This is the only way components reach the session; nothing is stored in
/// process-wide statics.
#[derive(Clone)]
pub struct NodeContext {
    /// Shared Zenoh session (closed by the runtime after `Node::run` returns)
    pub session: Arc<zenoh::Session>,
    /// Machine identifier (from YOLO_MACHINE_ID env, default: hostname)
    pub machine_id: String,
    /// Shutdown signal receiver; select! on this in the main loop
    pub shutdown_rx: tokio::sync::watch::Receiver<()>,
}

impl NodeContext {
    /// Health topic for a node: `nodes/{machine_id}/{node_name}/health`
    pub fn health_topic(&self, node_name: &str) -> String {
        health_topic(&self.machine_id, node_name)
    }

    /// True once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        crate::shutdown::is_shutdown(&self.shutdown_rx)
    }
}

pub(crate) fn health_topic(machine_id: &str, node_name: &str) -> String {
    format!("nodes/{}/{}/health", machine_id, node_name)
}

/// Resolve the machine id, replacing characters that are awkward in key expressions.
pub(crate) fn resolve_machine_id() -> String {
    std::env::var("YOLO_MACHINE_ID")
        .unwrap_or_else(|_| {
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        })
        .replace(['-', '.', '/', '*'], "_")
}
