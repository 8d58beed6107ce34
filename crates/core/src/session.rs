//! Client-side shadow of the current image and video analysis sessions.
//!
//! A [`DetectionSession`] holds one image session and one video session.
//! The two halves are independent: clearing one never touches the other,
//! and `progress` lives in the video half because only video (and camera)
//! analyses report it. Server payloads are folded into the video half
//! through [`VideoUpdate`], a typed partial update where `None` always means
//! "not present in this payload" and never "clear".

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::records::DetectedObject;
use crate::types::RecordId;
use crate::video::{
    clamp_progress, merge_tracks, TrackSummary, VideoDetections, VideoStatus,
    VideoStatusResponse, VideoSubmission,
};

/// Frame rate assumed until the server reports the real one.
pub const DEFAULT_FPS: f64 = 25.0;

// ---------------------------------------------------------------------------
// Shared value types
// ---------------------------------------------------------------------------

/// Name, size and MIME type of an uploaded file. Never the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFileMeta {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
}

/// Basic properties of an analysed video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub fps: f64,
    pub total_frames: u64,
}

impl Default for MediaInfo {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            total_frames: 0,
        }
    }
}

/// Result of a synchronous still-image (or camera frame) detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageDetection {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub objects: Vec<DetectedObject>,
}

// ---------------------------------------------------------------------------
// Image half
// ---------------------------------------------------------------------------

/// State of the current still-image analysis. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageSession {
    pub file_meta: Option<MediaFileMeta>,
    pub original_url: String,
    pub result_url: String,
    pub result: Option<ImageDetection>,
}

impl ImageSession {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Video half
// ---------------------------------------------------------------------------

/// State of the current video analysis.
///
/// This is exactly the subset that survives a restart; its serialized form
/// is the persisted blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSession {
    pub file_meta: Option<MediaFileMeta>,
    /// Server-issued identifier; empty until the upload is acknowledged.
    pub session_id: String,
    pub result_url: String,
    /// Render with every box visible, kept while a regenerated one is shown.
    pub original_result_url: Option<String>,
    pub status: Option<VideoStatus>,
    /// Last full status payload as received.
    pub raw_response: Option<serde_json::Value>,
    /// Tracked objects, unique by track ID, in first-seen order.
    pub objects: Vec<TrackSummary>,
    pub media_info: MediaInfo,
    /// Processing progress, `0..=100`.
    pub progress: u8,
}

impl Default for VideoSession {
    fn default() -> Self {
        Self {
            file_meta: None,
            session_id: String::new(),
            result_url: String::new(),
            original_result_url: None,
            status: None,
            raw_response: None,
            objects: Vec::new(),
            media_info: MediaInfo::default(),
            progress: 0,
        }
    }
}

impl VideoSession {
    pub fn has_session_id(&self) -> bool {
        !self.session_id.is_empty()
    }

    /// The server-issued id, or a precondition error when there is none.
    pub fn require_session_id(&self) -> Result<&str, CoreError> {
        if self.has_session_id() {
            Ok(&self.session_id)
        } else {
            Err(CoreError::Precondition(
                "video session has no server-issued id yet".into(),
            ))
        }
    }

    /// A session the server is still working on.
    pub fn is_in_flight(&self) -> bool {
        self.has_session_id() && !self.status.is_some_and(VideoStatus::is_terminal)
    }

    /// Show a render made for a hidden-box set.
    ///
    /// The first replacement remembers the all-visible render so that
    /// [`restore_original_result`](Self::restore_original_result) can bring
    /// it back.
    pub fn replace_result_url(&mut self, url: impl Into<String>) {
        if self.original_result_url.is_none() && !self.result_url.is_empty() {
            self.original_result_url = Some(std::mem::take(&mut self.result_url));
        }
        self.result_url = url.into();
    }

    /// Go back to the all-visible render. Returns `false` if none was kept.
    pub fn restore_original_result(&mut self) -> bool {
        match self.original_result_url.take() {
            Some(url) => {
                self.result_url = url;
                true
            }
            None => false,
        }
    }

    /// Merge a partial update. Fields absent from `update` keep their value.
    pub fn apply(&mut self, update: VideoUpdate) {
        let VideoUpdate {
            session_id,
            result_url,
            status,
            raw_response,
            objects,
            fps,
            total_frames,
            progress,
        } = update;

        if let Some(id) = session_id {
            self.session_id = id;
        }
        if let Some(url) = result_url {
            self.result_url = url;
        }
        if let Some(status) = status {
            self.status = Some(status);
        }
        if let Some(raw) = raw_response {
            self.raw_response = Some(raw);
        }
        if let Some(objects) = objects {
            merge_tracks(&mut self.objects, &objects);
        }
        if let Some(fps) = fps.filter(|f| f.is_finite() && *f > 0.0) {
            self.media_info.fps = fps;
        }
        if let Some(total) = total_frames {
            self.media_info.total_frames = total;
        }
        if let Some(progress) = progress {
            self.progress = progress.min(100);
        }
    }
}

/// Typed partial update of a [`VideoSession`].
///
/// Each `Some` field is present in the payload the update was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoUpdate {
    pub session_id: Option<String>,
    pub result_url: Option<String>,
    pub status: Option<VideoStatus>,
    pub raw_response: Option<serde_json::Value>,
    pub objects: Option<Vec<TrackSummary>>,
    pub fps: Option<f64>,
    pub total_frames: Option<u64>,
    pub progress: Option<u8>,
}

impl VideoUpdate {
    /// Fields carried by an upload acknowledgement.
    pub fn from_submission(submission: &VideoSubmission) -> Self {
        Self {
            session_id: submission.session_id.clone(),
            result_url: submission.result_url.clone(),
            status: submission.status,
            raw_response: serde_json::to_value(submission).ok(),
            ..Default::default()
        }
    }

    /// Fields carried by a status poll.
    ///
    /// A completed status without an explicit progress counts as 100%.
    pub fn from_status(status: &VideoStatusResponse) -> Self {
        let progress = match (status.progress, status.status) {
            (Some(raw), _) => Some(clamp_progress(raw)),
            (None, VideoStatus::Completed) => Some(100),
            (None, _) => None,
        };
        Self {
            result_url: status.result_url.clone(),
            status: Some(status.status),
            raw_response: serde_json::to_value(status).ok(),
            fps: status.fps,
            total_frames: status.total_frames,
            progress,
            ..Default::default()
        }
    }

    /// Fields carried by a detections summary or frame detail.
    pub fn from_detections(detections: &VideoDetections) -> Self {
        let tracks = detections.track_summaries();
        Self {
            objects: (!tracks.is_empty()).then_some(tracks),
            fps: detections.fps,
            total_frames: detections.total_frames,
            ..Default::default()
        }
    }

    pub fn from_objects(objects: Vec<TrackSummary>) -> Self {
        Self {
            objects: Some(objects),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Whole session
// ---------------------------------------------------------------------------

/// Both halves of the client's detection state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSession {
    pub image: ImageSession,
    pub video: VideoSession,
}

impl DetectionSession {
    /// Reset the image half only.
    pub fn clear_image(&mut self) {
        self.image = ImageSession::default();
    }

    /// Reset the video half, progress included.
    pub fn clear_video(&mut self) {
        self.video = VideoSession::default();
    }

    pub fn clear_all(&mut self) {
        self.clear_image();
        self.clear_video();
    }
}
