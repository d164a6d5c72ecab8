use std::{env, fs, path::Path, str::FromStr, time::Duration};

use crate::{
    domain::BotToken, errors::Error, messaging::types::KeyboardMarkup, ports::Endpoint, Result,
};

/// Smallest buffer size accepted for any of the three fixed buffers.
const MIN_BUFFER_SIZE: usize = 64;

/// Typed configuration for the poller.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: BotToken,
    /// Chats whose messages reach the handler. Empty means everyone.
    pub allowed_chats: Vec<i64>,
    pub endpoint: Endpoint,

    // Polling cadence
    pub poll_interval: Duration,
    /// `timeout` sent with `getUpdates` (server-side long-poll wait).
    pub poll_timeout_secs: u32,
    pub poll_limit: Option<u32>,
    /// Upper bound for one open/write/read exchange.
    pub cycle_deadline: Duration,

    // Buffers
    pub request_buffer_size: usize,
    pub receive_buffer_size: usize,
    pub payload_buffer_size: usize,
    /// Fail a cycle whose payload did not fit instead of parsing the prefix.
    pub strict_payload: bool,

    // Replies
    pub reply_keyboard: Option<KeyboardMarkup>,
}

impl Config {
    /// Defaults for everything except the token.
    pub fn with_token(token: BotToken) -> Self {
        Self {
            bot_token: token,
            allowed_chats: Vec::new(),
            endpoint: Endpoint::default(),
            poll_interval: Duration::from_millis(1000),
            poll_timeout_secs: 0,
            poll_limit: None,
            cycle_deadline: Duration::from_millis(30_000),
            request_buffer_size: 1024,
            receive_buffer_size: 512,
            payload_buffer_size: 4096,
            strict_payload: false,
            reply_keyboard: None,
        }
    }

    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key/value source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = get("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let mut cfg = Self::with_token(BotToken::new(token.trim()));
        cfg.allowed_chats = parse_csv_i64(get("TELEGRAM_ALLOWED_CHATS"));

        if let Some(host) = get("TELEGRAM_API_HOST").and_then(non_empty) {
            cfg.endpoint.host = host.trim().to_string();
        }
        if let Some(port) = parse_num(&get, "TELEGRAM_API_PORT") {
            cfg.endpoint.port = port;
        }

        if let Some(ms) = parse_num(&get, "POLL_INTERVAL_MS") {
            cfg.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_num(&get, "POLL_TIMEOUT_SECS") {
            cfg.poll_timeout_secs = secs;
        }
        cfg.poll_limit = parse_num(&get, "POLL_LIMIT").filter(|l: &u32| *l > 0);
        if let Some(ms) = parse_num(&get, "CYCLE_DEADLINE_MS") {
            cfg.cycle_deadline = Duration::from_millis(ms);
        }

        if let Some(n) = parse_num(&get, "REQUEST_BUFFER_SIZE") {
            cfg.request_buffer_size = n;
        }
        if let Some(n) = parse_num(&get, "RECEIVE_BUFFER_SIZE") {
            cfg.receive_buffer_size = n;
        }
        if let Some(n) = parse_num(&get, "PAYLOAD_BUFFER_SIZE") {
            cfg.payload_buffer_size = n;
        }
        cfg.strict_payload = get("STRICT_PAYLOAD").map(|s| truthy(&s)).unwrap_or(false);

        cfg.reply_keyboard = get("REPLY_KEYBOARD")
            .as_deref()
            .and_then(KeyboardMarkup::parse_layout)
            .map(KeyboardMarkup::resized);

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, size) in [
            ("REQUEST_BUFFER_SIZE", self.request_buffer_size),
            ("RECEIVE_BUFFER_SIZE", self.receive_buffer_size),
            ("PAYLOAD_BUFFER_SIZE", self.payload_buffer_size),
        ] {
            if size < MIN_BUFFER_SIZE {
                return Err(Error::Config(format!(
                    "{name} must be at least {MIN_BUFFER_SIZE} bytes (got {size})"
                )));
            }
        }

        let long_poll = Duration::from_secs(u64::from(self.poll_timeout_secs));
        if self.cycle_deadline <= long_poll {
            return Err(Error::Config(format!(
                "CYCLE_DEADLINE_MS ({:?}) must exceed POLL_TIMEOUT_SECS ({long_poll:?})",
                self.cycle_deadline
            )));
        }

        if self.endpoint.port == 0 {
            return Err(Error::Config("TELEGRAM_API_PORT must not be 0".to_string()));
        }

        Ok(())
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    let mut applied = 0usize;
    for (key, val) in dotenv_pairs(&contents) {
        // The real environment wins over the file.
        if env::var_os(&key).is_some() {
            tracing::debug!(key = %key, "dotenv entry shadowed by environment");
            continue;
        }
        env::set_var(&key, val);
        applied += 1;
    }
    tracing::debug!(path = %path.display(), applied, "dotenv file loaded");
}

/// `KEY=value` pairs from a dotenv file. Blank lines, `#` comments and lines
/// without `=` are dropped; an `export ` prefix and one layer of matching
/// quotes are stripped.
fn dotenv_pairs(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (k, v) = line.split_once('=')?;
            let key = k.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(v.trim()).to_string()))
        })
        .collect()
}

fn unquote(v: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|q| v.strip_prefix(*q)?.strip_suffix(*q))
        .unwrap_or(v)
}

fn truthy(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_num<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    get(key).and_then(|s| s.trim().parse::<T>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
