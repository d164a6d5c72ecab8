use std::time::Duration;

/// Core error type for the poller.
///
/// Adapter crates map their specific errors into this type so the poll loop
/// can handle every failure the same way: log it, skip the cycle, try again
/// on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("request does not fit into the {capacity}-byte request buffer")]
    ComposeOverflow { capacity: usize },

    #[error("transport open failed: {0}")]
    TransportOpenFailed(String),

    #[error("transport write failed: {0}")]
    TransportWriteFailed(String),

    #[error("transport read failed: {0}")]
    TransportReadFailed(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("payload exceeded the {capacity}-byte payload buffer")]
    PayloadTruncated { capacity: usize },

    #[error("bot api error: {description}")]
    Api { description: String },

    #[error("transport exchange exceeded the {0:?} deadline")]
    CycleTimeout(Duration),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Failures that happened on (or while bounding) the transport. The stream
    /// is torn down and the cycle is abandoned.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::TransportOpenFailed(_)
                | Error::TransportWriteFailed(_)
                | Error::TransportReadFailed(_)
                | Error::CycleTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
