//! Process lifecycle for yolo-zenoh nodes.
//!
//! Every node binary shares the same scaffolding: logging, CLI args, YAML
//! config, signal handling, the Zenoh session and a health heartbeat. Node
//! authors implement [`Node`] and call `run_node::<MyNode>().await`; the
//! runtime opens the session once, hands it out through [`NodeContext`], and
//! closes it once after the node returns, whether it succeeded or not.
//!
//! # Example
//!
//! ```ignore
//! use yolo_node_sdk::{Node, NodeContext};
//!
//! struct MyRelay { /* ... */ }
//!
//! #[async_trait::async_trait]
//! impl Node for MyRelay {
//!     type Config = MyConfig;
//!     fn name() -> &'static str { "my-relay" }
//!     async fn init(ctx: &NodeContext, config: &MyConfig) -> anyhow::Result<Self> { /* ... */ }
//!     async fn run(self, ctx: NodeContext) -> anyhow::Result<()> { /* ... */ }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     yolo_node_sdk::run_node::<MyRelay>().await
//! }
//! ```

mod config;
mod context;
mod health;
mod shutdown;
mod zenoh_session;

pub use config::{load_config, load_config_or_default};
pub use context::NodeContext;
pub use health::{Heartbeat, DEFAULT_HEARTBEAT_PERIOD};
pub use shutdown::is_shutdown;
pub use zenoh_session::{open_zenoh_session, resolve_endpoint, SessionMode};

// Re-exports so node crates share one version of these
pub use anyhow;
pub use async_trait;
pub use log;
pub use tokio;
pub use zenoh;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Trait that node authors implement to define their node's behavior.
#[async_trait::async_trait]
pub trait Node: Send + 'static {
    /// Node-specific configuration type (deserialized from YAML).
    type Config: serde::de::DeserializeOwned + Default + Send + Sync + 'static;

    /// Node name used in logs and the health topic.
    fn name() -> &'static str;

    /// Called once after the Zenoh session is established and config is loaded.
    /// Create publishers, subscribers, and open devices here; an error aborts
    /// startup with a non-zero exit code.
    async fn init(ctx: &NodeContext, config: &Self::Config) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Main loop. Must watch `ctx.shutdown_rx` and return `Ok(())` once it fires.
    async fn run(self, ctx: NodeContext) -> anyhow::Result<()>;
}

/// Built-in CLI arguments handled by the SDK.
#[derive(argh::FromArgs)]
#[argh(description = "yolo-zenoh node")]
struct SdkArgs {
    /// path to configuration file (defaults are used when it does not exist)
    #[argh(option, short = 'c', default = "default_config_path()")]
    config: PathBuf,

    /// zenoh endpoint to connect to
    #[argh(option, short = 'e')]
    endpoint: Option<String>,

    /// open a peer session instead of routing through zenohd
    #[argh(switch)]
    peer: bool,

    /// seconds between health heartbeats (default 5)
    #[argh(option, default = "DEFAULT_HEARTBEAT_PERIOD.as_secs()")]
    heartbeat_secs: u64,
}

fn default_config_path() -> PathBuf {
    PathBuf::from("config.yaml")
}

/// Run a node with the SDK runtime.
///
/// Handles logging init, CLI args, config load, shutdown channel, Zenoh
/// session, health heartbeat, and the final session close.
pub async fn run_node<N: Node>() -> anyhow::Result<()> {
    // 1. Init logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Parse CLI args
    let args: SdkArgs = argh::from_env();

    // 3. Load config
    let node_config: N::Config = config::load_config_or_default(&args.config)?;
    log::info!("{}: config resolved from {}", N::name(), args.config.display());

    // 4. Resolve machine_id
    let machine_id = context::resolve_machine_id();
    log::info!("Machine ID: {}", machine_id);

    // 5. Setup shutdown channel
    let (shutdown_tx, _shutdown_rx) = shutdown::setup_shutdown()?;

    // 6. Open Zenoh session
    let mode = if args.peer {
        SessionMode::Peer
    } else {
        SessionMode::Client
    };
    let endpoint = resolve_endpoint(&args.endpoint);
    let session = zenoh_session::open_zenoh_session(&endpoint, mode).await?;

    // 7. Init, run, close
    Lifecycle {
        session,
        machine_id,
        shutdown_tx,
        heartbeat_period: Duration::from_secs(args.heartbeat_secs),
    }
    .run::<N>(&node_config)
    .await?;

    log::info!("{} node shut down", N::name());
    Ok(())
}

/// Everything that happens against an open session.
struct Lifecycle {
    session: Arc<zenoh::Session>,
    machine_id: String,
    shutdown_tx: watch::Sender<()>,
    heartbeat_period: Duration,
}

impl Lifecycle {
    /// Init and run the node, then close the session. The close happens
    /// exactly once whether init, run, or neither failed.
    async fn run<N: Node>(self, node_config: &N::Config) -> anyhow::Result<()> {
        let result = self.init_and_run::<N>(node_config).await;

        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.session.close().await {
            log::warn!("Failed to close Zenoh session cleanly: {}", e);
        }
        result
    }

    async fn init_and_run<N: Node>(&self, node_config: &N::Config) -> anyhow::Result<()> {
        let ctx = NodeContext {
            session: self.session.clone(),
            machine_id: self.machine_id.clone(),
            shutdown_rx: self.shutdown_tx.subscribe(),
        };

        let heartbeat =
            health::HealthHeartbeat::new(N::name(), &self.machine_id, self.heartbeat_period)
                .spawn(self.session.clone(), self.shutdown_tx.subscribe())
                .await?;

        let result = match N::init(&ctx, node_config).await {
            Ok(node) => {
                log::info!("{} node initialized", N::name());
                node.run(ctx).await
            }
            Err(e) => Err(e),
        };

        // Stop the heartbeat before the session goes away
        let _ = self.shutdown_tx.send(());
        if let Err(e) = heartbeat.await {
            log::warn!("Health heartbeat task failed: {}", e);
        }

        result
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    /// Peer session listening on loopback only, no scouting.
    pub async fn loopback_session() -> Arc<zenoh::Session> {
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default, serde::Deserialize)]
    struct StubConfig {}

    static BROKEN_RUNS: AtomicUsize = AtomicUsize::new(0);

    /// Device that cannot be opened
    struct UnopenableNode;

    #[async_trait::async_trait]
    impl Node for UnopenableNode {
        type Config = StubConfig;

        fn name() -> &'static str {
            "unopenable"
        }

        async fn init(_ctx: &NodeContext, _config: &StubConfig) -> anyhow::Result<Self> {
            Err(anyhow::anyhow!("device /dev/video9 unopenable"))
        }

        async fn run(self, _ctx: NodeContext) -> anyhow::Result<()> {
            BROKEN_RUNS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Starts fine, then fails mid-run
    struct CrashingNode;

    #[async_trait::async_trait]
    impl Node for CrashingNode {
        type Config = StubConfig;

        fn name() -> &'static str {
            "crashing"
        }

        async fn init(ctx: &NodeContext, _config: &StubConfig) -> anyhow::Result<Self> {
            assert!(!ctx.session.is_closed());
            Ok(Self)
        }

        async fn run(self, ctx: NodeContext) -> anyhow::Result<()> {
            assert!(!ctx.session.is_closed());
            Err(anyhow::anyhow!("model crashed"))
        }
    }

    /// Runs until shutdown
    struct PatientNode;

    #[async_trait::async_trait]
    impl Node for PatientNode {
        type Config = StubConfig;

        fn name() -> &'static str {
            "patient"
        }

        async fn init(_ctx: &NodeContext, _config: &StubConfig) -> anyhow::Result<Self> {
            Ok(Self)
        }

        async fn run(self, ctx: NodeContext) -> anyhow::Result<()> {
            let mut shutdown_rx = ctx.shutdown_rx.clone();
            let _ = shutdown_rx.changed().await;
            Ok(())
        }
    }

    fn lifecycle(session: Arc<zenoh::Session>) -> (Lifecycle, watch::Receiver<()>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let lifecycle = Lifecycle {
            session,
            machine_id: "test_machine".to_string(),
            shutdown_tx,
            heartbeat_period: Duration::from_millis(20),
        };
        (lifecycle, shutdown_rx)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_init_error_closes_session() {
        let session = testing::loopback_session().await;
        let (lifecycle, shutdown_rx) = lifecycle(session.clone());

        let err = lifecycle
            .run::<UnopenableNode>(&StubConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unopenable"));
        assert_eq!(BROKEN_RUNS.load(Ordering::SeqCst), 0);
        assert!(is_shutdown(&shutdown_rx));
        assert!(session.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_error_closes_session() {
        let session = testing::loopback_session().await;
        let (lifecycle, shutdown_rx) = lifecycle(session.clone());

        let err = lifecycle
            .run::<CrashingNode>(&StubConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "model crashed");
        assert!(is_shutdown(&shutdown_rx));
        assert!(session.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clean_shutdown_closes_session() {
        let session = testing::loopback_session().await;
        let health = session
            .declare_subscriber("nodes/test_machine/patient/health")
            .await
            .unwrap();
        let (lifecycle, _shutdown_rx) = lifecycle(session.clone());
        let signal = lifecycle.shutdown_tx.clone();

        let handle = tokio::spawn(async move {
            lifecycle.run::<PatientNode>(&StubConfig::default()).await
        });

        // Heartbeats flow while the node runs
        let sample = tokio::time::timeout(Duration::from_secs(5), health.recv_async())
            .await
            .unwrap()
            .unwrap();
        let beat: Heartbeat = serde_json::from_slice(&sample.payload().to_bytes()).unwrap();
        assert_eq!(beat.node, "patient");
        assert!(!session.is_closed());

        signal.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(session.is_closed());
    }
}
