use crate::domain::UpdateId;

/// Offset value before anything has been acknowledged.
pub const NO_UPDATES_CONSUMED: i64 = -1;

/// Next update id the poller expects.
///
/// Owned by the poll loop; only moves forward, and only after an update was
/// handed to the dispatcher. Lives in memory for the process lifetime.
#[derive(Debug)]
pub struct OffsetTracker {
    offset: i64,
}

impl Default for OffsetTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self {
            offset: NO_UPDATES_CONSUMED,
        }
    }

    /// Offset to send with the next `getUpdates` (never negative).
    pub fn next_request_offset(&self) -> i64 {
        self.offset.max(0)
    }

    /// Acknowledge `update_id`. Returns `false` (and changes nothing) for ids
    /// below the current offset.
    pub fn observe(&mut self, update_id: UpdateId) -> bool {
        if update_id.0 < self.next_request_offset() {
            return false;
        }
        self.offset = update_id.0.saturating_add(1);
        true
    }
}
