//! Camera node binary

use yolo_relay::camera_node::CameraNode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    yolo_node_sdk::run_node::<CameraNode>().await
}
