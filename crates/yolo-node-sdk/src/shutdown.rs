use tokio::sync::watch;

/// Set up a shutdown channel triggered by SIGINT/SIGTERM.
///
/// The handler captures its own clone of the sender, so no process-wide
/// session handle is ever reachable from signal context.
pub fn setup_shutdown() -> anyhow::Result<(watch::Sender<()>, watch::Receiver<()>)> {
    let (tx, rx) = watch::channel(());
    let shutdown_tx = tx.clone();
    ctrlc::set_handler(move || {
        log::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    })?;
    Ok((tx, rx))
}

/// Returns true once the shutdown signal has fired or its sender is gone.
pub fn is_shutdown(rx: &watch::Receiver<()>) -> bool {
    rx.has_changed().unwrap_or(true)
}
