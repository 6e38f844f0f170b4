//! Monitor node binary

use yolo_relay::monitor_node::MonitorNode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    yolo_node_sdk::run_node::<MonitorNode>().await
}
