use crate::domain::ChatId;

// ============== Authorization ==============

/// Which chats may trigger the handler (and therefore get replies).
///
/// Messages from other chats are still parsed and acknowledged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecipientPolicy {
    Anyone,
    Only(Vec<ChatId>),
}

impl RecipientPolicy {
    /// `Anyone` for an empty list, otherwise an allow-list.
    pub fn from_ids(ids: &[i64]) -> Self {
        if ids.is_empty() {
            Self::Anyone
        } else {
            Self::Only(ids.iter().copied().map(ChatId).collect())
        }
    }

    pub fn permits(&self, chat_id: ChatId) -> bool {
        match self {
            Self::Anyone => true,
            Self::Only(allowed) => allowed.contains(&chat_id),
        }
    }
}
