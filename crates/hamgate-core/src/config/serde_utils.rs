//! Serde helpers for configuration files

/// Whole-second timeouts
///
/// `idle_timeout_seconds`, `session_timeout_seconds`,
/// `request_timeout_seconds` and `cache_ttl_seconds` are written as plain
/// integers and read into [`Duration`](std::time::Duration) fields.
/// Sub-second parts are dropped on write.
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
