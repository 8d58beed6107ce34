/// Server-assigned record identifiers are integer primary keys.
pub type RecordId = i64;

/// Identifier the tracker assigns to one physical object across frames.
pub type TrackId = u32;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
