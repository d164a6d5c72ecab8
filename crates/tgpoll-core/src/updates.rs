//! `getUpdates` response parsing.
//!
//! Each element of `result` is handled on its own: one broken element is
//! logged and skipped, the rest of the batch still goes through.

use serde_json::Value;

use crate::{
    domain::{ChatId, UpdateEvent, UpdateId},
    errors::Error,
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchItem {
    /// A text message to dispatch.
    Event(UpdateEvent),
    /// An update we do not handle (no text message). It still has to be
    /// acknowledged or the server keeps sending it.
    Ignored(UpdateId),
}

impl BatchItem {
    pub fn update_id(&self) -> UpdateId {
        match self {
            BatchItem::Event(ev) => ev.update_id,
            BatchItem::Ignored(id) => *id,
        }
    }
}

/// Updates in the order the server listed them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    pub items: Vec<BatchItem>,
}

impl UpdateBatch {
    pub fn events(&self) -> impl Iterator<Item = &UpdateEvent> {
        self.items.iter().filter_map(|item| match item {
            BatchItem::Event(ev) => Some(ev),
            BatchItem::Ignored(_) => None,
        })
    }

    pub fn into_events(self) -> Vec<UpdateEvent> {
        self.items
            .into_iter()
            .filter_map(|item| match item {
                BatchItem::Event(ev) => Some(ev),
                BatchItem::Ignored(_) => None,
            })
            .collect()
    }
}

/// Text message events contained in a `getUpdates` payload.
pub fn parse(payload: &[u8]) -> Result<Vec<UpdateEvent>> {
    parse_batch(payload).map(UpdateBatch::into_events)
}

/// Like [`parse`], but also reports updates without a text message.
pub fn parse_batch(payload: &[u8]) -> Result<UpdateBatch> {
    let doc = parse_document(payload)?;
    check_ok(&doc)?;

    let Some(results) = doc.get("result").and_then(Value::as_array) else {
        return Err(Error::MalformedPayload(
            "response has no `result` array".to_string(),
        ));
    };

    let mut batch = UpdateBatch::default();
    for (index, item) in results.iter().enumerate() {
        let Some(update_id) = item.get("update_id").and_then(Value::as_i64) else {
            tracing::warn!(index, "skipping update without a numeric update_id");
            continue;
        };
        let update_id = UpdateId(update_id);

        match text_message(item) {
            Ok(Some((chat_id, text))) => batch.items.push(BatchItem::Event(UpdateEvent {
                update_id,
                chat_id,
                text,
            })),
            Ok(None) => {
                tracing::debug!(update_id = update_id.0, "update carries no text message");
                batch.items.push(BatchItem::Ignored(update_id));
            }
            Err(reason) => {
                tracing::warn!(update_id = update_id.0, reason, "skipping malformed message");
                batch.items.push(BatchItem::Ignored(update_id));
            }
        }
    }

    Ok(batch)
}

/// Verify the envelope of a `sendMessage` response.
///
/// The echoed message often does not fit the payload buffer; a cut-off body
/// that still starts with `{"ok":true` counts as accepted.
pub fn check_send_response(payload: &[u8]) -> Result<()> {
    match parse_document(payload) {
        Ok(doc) => check_ok(&doc),
        Err(_) if payload.starts_with(br#"{"ok":true"#) => Ok(()),
        Err(e) => Err(e),
    }
}

fn parse_document(payload: &[u8]) -> Result<Value> {
    serde_json::from_slice(payload).map_err(|e| Error::MalformedPayload(e.to_string()))
}

fn check_ok(doc: &Value) -> Result<()> {
    if doc.get("ok").and_then(Value::as_bool) == Some(false) {
        let description = doc
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("request rejected")
            .to_string();
        return Err(Error::Api { description });
    }
    Ok(())
}

fn text_message(item: &Value) -> std::result::Result<Option<(ChatId, String)>, &'static str> {
    let Some(message) = item.get("message") else {
        return Ok(None);
    };
    let Some(text) = message.get("text").and_then(Value::as_str) else {
        return Ok(None);
    };
    let Some(chat_id) = message
        .get("chat")
        .and_then(|chat| chat.get("id"))
        .and_then(Value::as_i64)
    else {
        return Err("text message without chat.id");
    };
    Ok(Some((ChatId(chat_id), text.to_string())))
}
