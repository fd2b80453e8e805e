use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as Unix-epoch milliseconds. Rows cross the bridge as JSON,
/// so timestamps are stored as plain `i64` millis rather than a richer
/// date/time type — one less serialization format at the wire boundary.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as i64
}
