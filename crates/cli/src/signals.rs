use tokio::signal::unix::{SignalKind, signal};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// SIGINT or SIGTERM: finish the work in progress and exit.
    Shutdown,
}

/// Forward shutdown signals to `tx` until the receiver goes away.
pub async fn wait_for_signal(tx: flume::Sender<SignalEvent>) -> anyhow::Result<()> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    loop {
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        debug!(signal = name, "received signal");
        if tx.send_async(SignalEvent::Shutdown).await.is_err() {
            return Ok(());
        }
    }
}
