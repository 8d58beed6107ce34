//! REST API client for the detection service.
//!
//! Every method issues exactly one HTTP request and maps the response
//! into a typed payload. Nothing is retried or cached; non-2xx responses
//! surface as [`ApiError::Status`] with the server's status and body
//! unchanged.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tracklens_core::pagination::PageRequest;
use tracklens_core::records::{DetectionRecord, RecordPage, RecordType};
use tracklens_core::session::ImageDetection;
use tracklens_core::types::{RecordId, TrackId};
use tracklens_core::video::{
    ToggleBoxesResponse, TrackSummary, VideoDetections, VideoStatus, VideoStatusResponse,
    VideoSubmission,
};

use crate::config::ClientConfig;
use crate::upload::MediaUpload;
use crate::urls::MediaUrls;

/// Confidence threshold applied to video detections unless overridden.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Part filename used for camera frames when the caller gives none.
pub const DEFAULT_FRAME_NAME: &str = "frame.jpg";

/// HTTP client for one detection service.
pub struct DetectionApi {
    client: reqwest::Client,
    api_base: String,
    urls: MediaUrls,
    upload_timeout: Duration,
}

/// Response of the camera clip endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraClip {
    pub id: RecordId,
    #[serde(default)]
    pub source_path: Option<String>,
}

/// Errors from the detection REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Detection API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The service reported that analysing a video failed.
    #[error("Processing of video {video_id} failed: {detail}")]
    ProcessingFailed { video_id: String, detail: String },

    /// A 2xx response whose body did not have the expected shape.
    #[error("Could not decode {what} response: {detail}")]
    Decode { what: &'static str, detail: String },

    /// The call was rejected locally; no request was sent.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Reading an upload from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status of a server-reported failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }
}

impl DetectionApi {
    /// Create a client from configuration, applying its timeouts.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        let mut api = Self::with_client(client, &config.api_base);
        api.upload_timeout = config.upload_timeout;
        Ok(api)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    ///
    /// * `api_base` - API root, e.g. `http://host:8000/api`.
    pub fn with_client(client: reqwest::Client, api_base: &str) -> Self {
        let api_base = api_base.trim_end_matches('/').to_string();
        Self {
            urls: MediaUrls::from_api_base(&api_base),
            client,
            api_base,
            upload_timeout: ClientConfig::default().upload_timeout,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// URL helpers for media served by the same service.
    pub fn urls(&self) -> &MediaUrls {
        &self.urls
    }

    // ---- detection ----

    /// Run detection on a still image.
    ///
    /// Sends `POST /detect/image`. The service processes the image before
    /// responding and creates an `image` record.
    pub async fn submit_image(&self, upload: MediaUpload) -> Result<ImageDetection, ApiError> {
        tracing::debug!(file = %upload.file_name, size = upload.bytes.len(), "Submitting image");
        let form = Form::new().part("file", file_part(upload)?);

        let response = self
            .client
            .post(self.endpoint("detect/image"))
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await?;

        parse_response(response).await
    }

    /// Upload a video for tracking.
    ///
    /// Sends `POST /detect/video` with the file and the confidence
    /// threshold. Returns as soon as the upload is accepted; analysis
    /// continues on the server.
    pub async fn submit_video(
        &self,
        upload: MediaUpload,
        confidence: f64,
    ) -> Result<VideoSubmission, ApiError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ApiError::Precondition(format!(
                "confidence must be within [0, 1], got {confidence}"
            )));
        }
        tracing::debug!(
            file = %upload.file_name,
            size = upload.bytes.len(),
            confidence,
            "Submitting video",
        );

        let conf = confidence.to_string();
        let form = Form::new()
            .part("file", file_part(upload)?)
            .text("conf", conf.clone());

        // Sent twice: the service reads the query, older builds read the form.
        let response = self
            .client
            .post(self.endpoint("detect/video"))
            .query(&[("conf", conf)])
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await?;

        parse_response(response).await
    }

    // ---- records ----

    /// Fetch one page of records, optionally restricted to one type.
    ///
    /// Sends `GET /records/list?page=&limit=[&type=]`.
    pub async fn list_records(
        &self,
        page: PageRequest,
        type_filter: Option<RecordType>,
    ) -> Result<RecordPage, ApiError> {
        let mut query = vec![
            ("page", page.page().to_string()),
            ("limit", page.limit().to_string()),
        ];
        if let Some(kind) = type_filter {
            query.push(("type", kind.as_str().to_string()));
        }
        tracing::debug!(
            page = page.page(),
            limit = page.limit(),
            filter = ?type_filter,
            "Listing records",
        );

        let response = self
            .client
            .get(self.endpoint("records/list"))
            .query(&query)
            .send()
            .await?;

        parse_response(response).await
    }

    /// Fetch the newest `limit` records as a flat list.
    ///
    /// Legacy, non-paginated listing kept for older service versions.
    pub async fn list_recent_records(
        &self,
        limit: u32,
        type_filter: Option<RecordType>,
    ) -> Result<Vec<DetectionRecord>, ApiError> {
        if limit == 0 {
            return Err(ApiError::Precondition("limit must be > 0".into()));
        }
        let mut query = vec![("limit", limit.to_string())];
        if let Some(kind) = type_filter {
            query.push(("type", kind.as_str().to_string()));
        }

        let response = self
            .client
            .get(self.endpoint("records/list"))
            .query(&query)
            .send()
            .await?;

        let mut records: Vec<DetectionRecord> = parse_response(response).await?;
        records.truncate(limit as usize);
        Ok(records)
    }

    /// Fetch one record including its source and result locations.
    pub async fn get_record(&self, id: RecordId) -> Result<DetectionRecord, ApiError> {
        let response = self
            .client
            .get(self.endpoint(&format!("records/{id}")))
            .send()
            .await?;

        parse_response(response).await
    }

    /// Delete a record.
    ///
    /// With `delete_files` the service also removes the source and result
    /// files; otherwise only the metadata goes.
    pub async fn delete_record(&self, id: RecordId, delete_files: bool) -> Result<Value, ApiError> {
        tracing::debug!(record_id = id, delete_files, "Deleting record");
        let mut request = self.client.delete(self.endpoint(&format!("records/{id}")));
        if delete_files {
            request = request.query(&[("delete_files", "true")]);
        }

        let response = request.send().await?;
        parse_ack(response).await
    }

    // ---- video ----

    /// Set which tracks are hidden in a video's rendered output.
    ///
    /// Sends `POST /video/{id}/toggle-boxes` with one `hidden_ids` query
    /// pair per track. With `regenerate` the service re-renders the video
    /// before responding, so the upload timeout applies.
    pub async fn toggle_video_boxes(
        &self,
        video_id: &str,
        hidden_ids: &[TrackId],
        regenerate: bool,
    ) -> Result<ToggleBoxesResponse, ApiError> {
        require_id(video_id)?;
        let mut query: Vec<(&str, String)> = hidden_ids
            .iter()
            .map(|id| ("hidden_ids", id.to_string()))
            .collect();
        query.push(("regenerate", regenerate.to_string()));
        tracing::debug!(video_id, ?hidden_ids, regenerate, "Toggling video boxes");

        let mut request = self
            .client
            .post(self.endpoint(&format!("video/{}/toggle-boxes", encode(video_id))))
            .query(&query);
        if regenerate {
            request = request.timeout(self.upload_timeout);
        }

        let response = request.send().await?;
        let response = ensure_success(response).await?;
        toggle_from_text(&response.text().await?)
    }

    /// Fetch the whole-video summary, or one frame when `frame_index` is
    /// given (0-based).
    pub async fn get_video_detections(
        &self,
        video_id: &str,
        frame_index: Option<u64>,
    ) -> Result<VideoDetections, ApiError> {
        require_id(video_id)?;
        let mut request = self
            .client
            .get(self.endpoint(&format!("video/{}/detections", encode(video_id))));
        if let Some(frame) = frame_index {
            request = request.query(&[("frame_index", frame)]);
        }

        let response = request.send().await?;
        parse_response(response).await
    }

    /// Fetch every tracked object in a video, aggregated by track ID.
    pub async fn get_video_objects(&self, video_id: &str) -> Result<Vec<TrackSummary>, ApiError> {
        require_id(video_id)?;
        let response = self
            .client
            .get(self.endpoint(&format!("video/{}/objects", encode(video_id))))
            .send()
            .await?;

        let value: Value = parse_response(response).await?;
        tracks_from_value(value)
    }

    /// Clear every hidden-track override for a video.
    pub async fn reset_video_boxes(&self, video_id: &str) -> Result<Value, ApiError> {
        require_id(video_id)?;
        tracing::debug!(video_id, "Resetting video boxes");
        let response = self
            .client
            .post(self.endpoint(&format!("video/{}/reset", encode(video_id))))
            .send()
            .await?;

        parse_ack(response).await
    }

    /// Poll the processing state of a video.
    ///
    /// A `failed` status is returned as [`ApiError::ProcessingFailed`].
    pub async fn get_video_status(&self, video_id: &str) -> Result<VideoStatusResponse, ApiError> {
        require_id(video_id)?;
        let response = self
            .client
            .get(self.endpoint(&format!("video/{}/status", encode(video_id))))
            .send()
            .await?;

        let status: VideoStatusResponse = parse_response(response).await?;
        if status.status == VideoStatus::Failed {
            return Err(ApiError::ProcessingFailed {
                video_id: video_id.to_string(),
                detail: status
                    .message
                    .clone()
                    .unwrap_or_else(|| "no detail given".to_string()),
            });
        }
        Ok(status)
    }

    // ---- camera ----

    /// Run detection on one captured camera frame.
    pub async fn post_camera_frame(
        &self,
        mut upload: MediaUpload,
    ) -> Result<ImageDetection, ApiError> {
        if upload.file_name.is_empty() {
            upload.file_name = DEFAULT_FRAME_NAME.to_string();
        }
        let form = Form::new().part("file", file_part(upload)?);
        let response = self
            .client
            .post(self.endpoint("camera/frame"))
            .multipart(form)
            .send()
            .await?;

        parse_response(response).await
    }

    /// Store a recorded camera clip as a `camera_video` record.
    pub async fn save_camera_clip(&self, upload: MediaUpload) -> Result<CameraClip, ApiError> {
        let form = Form::new().part("file", file_part(upload)?);
        let response = self
            .client
            .post(self.endpoint("camera/save"))
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await?;

        parse_response(response).await
    }

    pub async fn start_camera(&self, config: &Value) -> Result<Value, ApiError> {
        let response = self
            .client
            .post(self.endpoint("camera/start"))
            .json(config)
            .send()
            .await?;
        parse_ack(response).await
    }

    pub async fn stop_camera(&self) -> Result<Value, ApiError> {
        self.post_empty("camera/stop").await
    }

    pub async fn camera_status(&self) -> Result<Value, ApiError> {
        self.get_json("camera/status").await
    }

    pub async fn camera_list(&self) -> Result<Value, ApiError> {
        self.get_json("camera/list").await
    }

    // ---- model ----

    pub async fn model_info(&self) -> Result<Value, ApiError> {
        self.get_json("model/info").await
    }

    /// Class names the loaded model can detect.
    pub async fn model_classes(&self) -> Result<Value, ApiError> {
        self.get_json("model/classes").await
    }

    pub async fn model_list(&self) -> Result<Value, ApiError> {
        self.get_json("model/list").await
    }

    /// Ask the service to load a different model file.
    pub async fn switch_model(&self, model_path: &str) -> Result<Value, ApiError> {
        if model_path.trim().is_empty() {
            return Err(ApiError::Precondition("model path must not be empty".into()));
        }
        let response = self
            .client
            .post(self.endpoint("model/switch"))
            .json(&serde_json::json!({ "model_path": model_path }))
            .send()
            .await?;
        parse_ack(response).await
    }

    // ---- system ----

    pub async fn system_status(&self) -> Result<Value, ApiError> {
        self.get_json("system/status").await
    }

    pub async fn gpu_status(&self) -> Result<Value, ApiError> {
        self.get_json("system/gpu").await
    }

    pub async fn memory_status(&self) -> Result<Value, ApiError> {
        self.get_json("system/memory").await
    }

    pub async fn cpu_status(&self) -> Result<Value, ApiError> {
        self.get_json("system/cpu").await
    }

    // ---- private helpers ----

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let response = self.client.get(self.endpoint(path)).send().await?;
        parse_response(response).await
    }

    async fn post_empty(&self, path: &str) -> Result<Value, ApiError> {
        let response = self.client.post(self.endpoint(path)).send().await?;
        parse_ack(response).await
    }
}

/// Build the multipart `file` part for an upload.
fn file_part(upload: MediaUpload) -> Result<Part, ApiError> {
    let MediaUpload {
        file_name,
        mime_type,
        bytes,
    } = upload;
    Ok(Part::bytes(bytes).file_name(file_name).mime_str(&mime_type)?)
}

fn require_id(video_id: &str) -> Result<(), ApiError> {
    if video_id.trim().is_empty() {
        return Err(ApiError::Precondition("video id must not be empty".into()));
    }
    Ok(())
}

fn encode(segment: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(segment)
}

/// Accept either a bare array of tracks or an object wrapping one under
/// `objects` or `data`.
fn tracks_from_value(value: Value) -> Result<Vec<TrackSummary>, ApiError> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map
            .remove("objects")
            .or_else(|| map.remove("data"))
            .unwrap_or(Value::Array(Vec::new())),
        other => {
            return Err(ApiError::Decode {
                what: "objects",
                detail: format!("unexpected payload {other}"),
            })
        }
    };
    serde_json::from_value(list).map_err(|e| ApiError::Decode {
        what: "objects",
        detail: e.to_string(),
    })
}

/// An empty toggle body is an acknowledgement with no details.
fn toggle_from_text(text: &str) -> Result<ToggleBoxesResponse, ApiError> {
    if text.trim().is_empty() {
        return Ok(ToggleBoxesResponse::default());
    }
    serde_json::from_str(text).map_err(|e| ApiError::Decode {
        what: "toggle",
        detail: format!("{e}: {text}"),
    })
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or an [`ApiError::Status`] containing the status
/// and body text on failure.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        tracing::debug!(status = status.as_u16(), body = %body, "Detection API returned an error");
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

/// Read an acknowledgement body. Empty bodies become `null` and non-JSON
/// bodies are returned as a string.
async fn parse_ack(response: reqwest::Response) -> Result<Value, ApiError> {
    let response = ensure_success(response).await?;
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
