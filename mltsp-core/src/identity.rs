//! Identity and time types

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Opaque record key, unique within its collection.
///
/// Keys are strings rather than UUIDs because user records are keyed by
/// email address and keys minted elsewhere must round-trip unchanged.
pub type RecordKey = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new record key (UUIDv7, so keys sort by creation time).
pub fn new_record_key() -> RecordKey {
    Uuid::now_v7().to_string()
}
