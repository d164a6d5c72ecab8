use serde::Serialize;

use crate::{domain::ChatId, messaging::types::KeyboardMarkup, Result};

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a KeyboardMarkup>,
}

/// Compact `sendMessage` body. `reply_markup` is left out entirely when no
/// keyboard is given.
pub fn compose_reply(
    chat_id: ChatId,
    text: &str,
    markup: Option<&KeyboardMarkup>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    compose_reply_into(chat_id, text, markup, &mut out)?;
    Ok(out)
}

/// Same as [`compose_reply`], reusing `out`'s allocation.
pub fn compose_reply_into(
    chat_id: ChatId,
    text: &str,
    markup: Option<&KeyboardMarkup>,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.clear();
    serde_json::to_writer(
        &mut *out,
        &SendMessageBody {
            chat_id: chat_id.0,
            text,
            reply_markup: markup,
        },
    )?;
    Ok(())
}
