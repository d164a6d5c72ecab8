use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tgpoll_core::{
    config::Config,
    connectivity::Connectivity,
    messaging::port::MessageHandler,
    poll::PollLoop,
    ports::Connector,
    Result,
};

use crate::TlsConnector;

/// Poll the Bot API over TLS until `shutdown` fires.
pub async fn run_polling(
    cfg: Arc<Config>,
    handler: Arc<dyn MessageHandler>,
    connectivity: Connectivity,
    shutdown: CancellationToken,
) -> Result<()> {
    let connector: Arc<dyn Connector> = Arc::new(TlsConnector::new()?);

    // Basic startup info.
    tracing::info!(
        bot = %cfg.bot_token,
        endpoint = %format!("{}:{}", cfg.endpoint.host, cfg.endpoint.port),
        "tgpoll started"
    );
    if cfg.allowed_chats.is_empty() {
        tracing::info!("replying to every chat");
    } else {
        tracing::info!(chats = ?cfg.allowed_chats, "replying only to allowed chats");
    }

    PollLoop::new(cfg, connector, handler)
        .run(connectivity, shutdown)
        .await;

    Ok(())
}
