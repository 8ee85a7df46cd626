use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// return millisecond
pub(crate) fn get_now_as_u128() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// return millisecond as a property value timestamp
pub(crate) fn timestamp_millis() -> i64 {
    i64::try_from(get_now_as_u128()).unwrap_or(i64::MAX)
}
