use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tgpoll_core::{config::Config, connectivity::Connectivity, handlers::EchoHandler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tgpoll_core::logging::init("tgpoll")?;

    let cfg = Arc::new(Config::load()?);
    let handler = Arc::new(EchoHandler::new(cfg.reply_keyboard.clone()));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("ctrl-c received, shutting down");
                    shutdown.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "cannot listen for ctrl-c"),
            }
        });
    }

    tgpoll_tls::runner::run_polling(cfg, handler, Connectivity::always_up(), shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("poller failed: {e}"))?;

    Ok(())
}
