use async_trait::async_trait;

use crate::{
    domain::UpdateEvent,
    messaging::{
        port::MessageHandler,
        types::{KeyboardMarkup, Reply},
    },
    Result,
};

/// Answers every message with its own text, plus the configured keyboard.
#[derive(Clone, Debug, Default)]
pub struct EchoHandler {
    keyboard: Option<KeyboardMarkup>,
}

impl EchoHandler {
    pub fn new(keyboard: Option<KeyboardMarkup>) -> Self {
        Self { keyboard }
    }
}

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&self, event: &UpdateEvent) -> Result<Option<Reply>> {
        if event.text.trim().is_empty() {
            return Ok(None);
        }
        let reply = Reply::text(event.text.clone());
        Ok(Some(match &self.keyboard {
            Some(kb) => reply.with_markup(kb.clone()),
            None => reply,
        }))
    }
}
