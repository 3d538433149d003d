use std::time::{SystemTime, UNIX_EPOCH};

pub type ConnectionId = uuid::Uuid;
pub type CellId = String;
pub type GroupName = String;

/// Unix time in milliseconds.
pub type Timestamp = u64;

pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}
