//! Signal handling for graceful shutdown

use tokio::signal::unix::{signal, SignalKind};

/// Wait for SIGTERM or SIGINT and return the name of the one received
///
/// Fails only if the handlers cannot be registered.
pub async fn shutdown_requested() -> std::io::Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}
