use tokio_util::sync::CancellationToken;

/// Installs an interrupt (Ctrl-C) listener and returns a token that is
/// cancelled when the signal arrives. Subsystems watch the token and drain
/// gracefully.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let handler = token.clone();

    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for shutdown signal");
            return;
        }
        tracing::info!("received interrupt, initiating graceful shutdown");
        handler.cancel();
    });

    token
}
