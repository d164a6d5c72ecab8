use async_trait::async_trait;

use crate::{domain::UpdateEvent, messaging::types::Reply, Result};

/// The single hook the poll loop calls for every authorized text message.
///
/// Returning `Ok(None)` means "seen, nothing to say". An `Err` is logged;
/// the update is acknowledged either way.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, event: &UpdateEvent) -> Result<Option<Reply>>;
}
