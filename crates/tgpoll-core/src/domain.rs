use std::fmt;

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

/// Telegram update id (numeric, strictly increasing per bot).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpdateId(pub i64);

/// One text message pulled out of a `getUpdates` response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEvent {
    pub update_id: UpdateId,
    pub chat_id: ChatId,
    pub text: String,
}

/// Bot API credential.
///
/// Formatting never prints the secret half: `123456:AAF...` renders as
/// `123456:****`.
#[derive(Clone, PartialEq, Eq)]
pub struct BotToken(String);

impl BotToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The full secret, for request composition only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn redacted(&self) -> String {
        match self.0.split_once(':') {
            Some((bot_id, _)) => format!("{bot_id}:****"),
            None => "****".to_string(),
        }
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BotToken").field(&self.redacted()).finish()
    }
}

impl fmt::Display for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_formatting_is_redacted() {
        let token = BotToken::new("523164356:AAFz9slk922jd0usbGzoNbYR4N8f3RFVr44");
        assert_eq!(token.to_string(), "523164356:****");
        assert!(!format!("{token:?}").contains("AAFz"));
        assert_eq!(
            token.expose(),
            "523164356:AAFz9slk922jd0usbGzoNbYR4N8f3RFVr44"
        );
    }

    #[test]
    fn token_without_bot_id_is_fully_hidden() {
        assert_eq!(BotToken::new("secret").to_string(), "****");
    }
}
