use tokio::sync::watch;
use tracing::{error, info};

/// Flips the shared flag once the process is asked to stop.
pub async fn watch_signals(stop: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "worker: failed to listen for ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "worker: failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("worker: received ctrl+C, shutting down"),
        _ = terminate => info!("worker: received terminate, shutting down"),
    }
    let _ = stop.send(true);
}

pub async fn stopped(mut stop: watch::Receiver<bool>) {
    // A dropped sender also ends the wait.
    let _ = stop.wait_for(|stopping| *stopping).await;
}
