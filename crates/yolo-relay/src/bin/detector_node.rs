//! Detector node binary

use yolo_relay::detector_node::DetectorNode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    yolo_node_sdk::run_node::<DetectorNode>().await
}
