//! Detection records as persisted by the analysis service.
//!
//! The client only ever observes and deletes records. Field names accept
//! both the current wire names and the older column names the service
//! still emits from its legacy listing (`source_path`, `detect_time`, ...).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;
use crate::types::{RecordId, Timestamp};

// ---------------------------------------------------------------------------
// Record type / status
// ---------------------------------------------------------------------------

/// Media kind a record was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Image,
    Video,
    Camera,
    /// A recorded camera clip saved without per-frame processing.
    CameraVideo,
    /// Any type this client does not know about yet.
    #[serde(other)]
    Unknown,
}

impl RecordType {
    /// Wire value used in the `type` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Camera => "camera",
            Self::CameraVideo => "camera_video",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "camera" => Ok(Self::Camera),
            "camera_video" => Ok(Self::CameraVideo),
            other => Err(CoreError::Validation(format!(
                "Invalid record type '{other}'. Must be one of: image, video, camera, camera_video"
            ))),
        }
    }
}

/// Server-side processing state of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Processing,
    /// The service writes a record only once processing has finished, so a
    /// record without a status is a completed one.
    #[default]
    Completed,
    Failed,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One detected object inside a still image or camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    #[serde(rename = "class")]
    pub class_name: String,
    pub conf: f32,
    /// `[x1, y1, x2, y2]` in source pixels.
    pub bbox: [i32; 4],
}

/// One persisted unit of work on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, alias = "source_path")]
    pub source_url: Option<String>,
    #[serde(default, alias = "result_path")]
    pub result_url: Option<String>,
    #[serde(
        default,
        alias = "detect_time",
        deserialize_with = "deserialize_timestamp"
    )]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub objects: Vec<DetectedObject>,
}

/// Response body of the paginated listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    /// Size of the whole (filtered) collection at load time.
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub data: Vec<DetectionRecord>,
}

// ---------------------------------------------------------------------------
// Timestamp parsing
// ---------------------------------------------------------------------------

/// Parse a record timestamp.
///
/// Accepts RFC 3339 and naive ISO-8601 (`2024-05-01T12:00:00[.fff]`, with
/// either `T` or a space as separator). Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, CoreError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| CoreError::Validation(format!("Invalid timestamp '{raw}': {e}")))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| parse_timestamp(&s).map_err(serde::de::Error::custom))
        .transpose()
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
