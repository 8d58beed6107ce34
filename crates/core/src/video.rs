//! Video tracking payloads exchanged with the analysis service.
//!
//! Video analysis is asynchronous: the upload returns immediately and the
//! client polls for status. Payloads here are deliberately lenient (most
//! fields optional, unknown fields kept in `extra`) because the service
//! sends different subsets on different calls.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::TrackId;

/// Processing state of a video session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Aggregated summary of one tracked object across the whole video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    #[serde(alias = "id")]
    pub track_id: TrackId,
    #[serde(rename = "class", alias = "class_name", default)]
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_frame: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_frame: Option<u64>,
    #[serde(default, alias = "frames", skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u64>,
    #[serde(default, alias = "confidence", skip_serializing_if = "Option::is_none")]
    pub max_confidence: Option<f32>,
}

impl TrackSummary {
    /// Fold a newer summary of the same track into this one.
    ///
    /// Frame ranges only widen, counts and confidence only grow, and a
    /// non-empty class name from the newer summary wins.
    pub fn absorb(&mut self, newer: &TrackSummary) {
        debug_assert_eq!(self.track_id, newer.track_id);
        if !newer.class_name.is_empty() {
            self.class_name = newer.class_name.clone();
        }
        self.first_frame = min_opt(self.first_frame, newer.first_frame);
        self.last_frame = max_opt(self.last_frame, newer.last_frame);
        self.frame_count = max_opt(self.frame_count, newer.frame_count);
        self.max_confidence = match (self.max_confidence, newer.max_confidence) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

fn min_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Merge `incoming` summaries into `existing`, keyed by track ID.
///
/// Existing tracks keep their position; tracks seen for the first time are
/// appended in the order they arrive. Duplicates inside `incoming` are
/// folded together as well.
pub fn merge_tracks(existing: &mut Vec<TrackSummary>, incoming: &[TrackSummary]) {
    for summary in incoming {
        match existing.iter_mut().find(|t| t.track_id == summary.track_id) {
            Some(current) => current.absorb(summary),
            None => existing.push(summary.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire payloads
// ---------------------------------------------------------------------------

/// Response to a video upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoSubmission {
    #[serde(
        default,
        alias = "video_id",
        alias = "id",
        deserialize_with = "string_or_number"
    )]
    pub session_id: Option<String>,
    #[serde(default)]
    pub status: Option<VideoStatus>,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Echo of the processing configuration (confidence, stored filename).
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Response of the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStatusResponse {
    pub status: VideoStatus,
    /// Percentage, possibly fractional.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub total_frames: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One box in a single-frame detail response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetection {
    #[serde(default, alias = "id")]
    pub track_id: Option<TrackId>,
    #[serde(rename = "class", alias = "class_name", default)]
    pub class_name: String,
    #[serde(default)]
    pub conf: Option<f32>,
    #[serde(default)]
    pub bbox: Vec<f64>,
}

/// Either a whole-session summary (no `frame_index`) or one frame's detail.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoDetections {
    #[serde(default)]
    pub frame_index: Option<u64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub total_frames: Option<u64>,
    #[serde(default)]
    pub objects: Option<Vec<TrackSummary>>,
    #[serde(default)]
    pub detections: Option<Vec<FrameDetection>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl VideoDetections {
    pub fn is_frame_detail(&self) -> bool {
        self.frame_index.is_some()
    }

    /// Track summaries carried by this payload.
    ///
    /// Whole-session summaries carry them directly; a frame detail is
    /// turned into one single-frame summary per tracked box.
    pub fn track_summaries(&self) -> Vec<TrackSummary> {
        let mut tracks = self.objects.clone().unwrap_or_default();
        if let Some(detections) = &self.detections {
            let observed: Vec<TrackSummary> = detections
                .iter()
                .filter_map(|d| {
                    d.track_id.map(|track_id| TrackSummary {
                        track_id,
                        class_name: d.class_name.clone(),
                        first_frame: self.frame_index,
                        last_frame: self.frame_index,
                        frame_count: None,
                        max_confidence: d.conf,
                    })
                })
                .collect();
            merge_tracks(&mut tracks, &observed);
        }
        tracks
    }
}

/// Response of the toggle-boxes endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToggleBoxesResponse {
    /// Whether a new annotated artifact was rendered for this call.
    #[serde(default)]
    pub regenerated: bool,
    #[serde(default, alias = "new_result_url")]
    pub result_url: Option<String>,
    #[serde(default)]
    pub hidden_ids: Vec<TrackId>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ToggleBoxesResponse {
    /// Location of the newly rendered artifact, if the server produced one.
    pub fn confirmed_artifact(&self) -> Option<&str> {
        if !self.regenerated {
            return None;
        }
        self.result_url.as_deref().filter(|url| !url.is_empty())
    }
}

/// Convert a possibly fractional percentage to `0..=100`.
pub fn clamp_progress(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) if !s.is_empty() => Some(s),
        Some(Raw::Text(_)) | None => None,
        Some(Raw::Int(n)) => Some(n.to_string()),
    })
}
