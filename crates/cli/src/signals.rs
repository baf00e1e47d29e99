use flume::Sender;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// SIGINT / SIGTERM, or Ctrl-C where Unix signals are unavailable.
    Shutdown,
    /// SIGUSR1
    DumpStatus,
    /// SIGUSR2
    ScanNow,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to install signal handler: {0}")]
    Install(#[from] std::io::Error),

    #[error("Signal receiver dropped")]
    ReceiverDropped,
}

/// Forward process signals to `tx` until the receiver goes away.
#[cfg(unix)]
pub async fn wait_for_signal(tx: Sender<SignalEvent>) -> Result<(), Error> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mut sigusr2 = signal(SignalKind::user_defined2())?;

    loop {
        let event = tokio::select! {
            _ = sigint.recv() => {
                info!("received SIGINT");
                SignalEvent::Shutdown
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                SignalEvent::Shutdown
            }
            _ = sigusr1.recv() => {
                debug!("received SIGUSR1");
                SignalEvent::DumpStatus
            }
            _ = sigusr2.recv() => {
                debug!("received SIGUSR2");
                SignalEvent::ScanNow
            }
        };
        tx.send_async(event)
            .await
            .map_err(|_| Error::ReceiverDropped)?;
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal(tx: Sender<SignalEvent>) -> Result<(), Error> {
    loop {
        tokio::signal::ctrl_c().await?;
        info!("received Ctrl-C");
        tx.send_async(SignalEvent::Shutdown)
            .await
            .map_err(|_| Error::ReceiverDropped)?;
    }
}
