//! In-process fake of the detection service for integration tests.
//!
//! Serves the same routes as the real service under `/api` on an ephemeral
//! port. Video `abc123` completes on the third status poll; toggling with
//! `regenerate=true` renders a new versioned artifact each time.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use tracklens_client::DetectionApi;

pub const VIDEO_ID: &str = "abc123";
pub const INITIAL_RESULT_URL: &str = "/api/files/result/res_abc123.mp4";

/// Everything the fake has seen and served.
#[derive(Debug, Default)]
pub struct FakeState {
    /// Records, newest first.
    pub records: Vec<Value>,
    pub next_record_id: i64,
    /// `(file name, conf from query, conf from form)` per video upload.
    pub video_uploads: Vec<(Option<String>, Option<String>, Option<String>)>,
    pub status_polls: u32,
    pub hidden: BTreeSet<u32>,
    /// `(hidden ids in request order, regenerate)` per toggle.
    pub toggles: Vec<(Vec<u32>, bool)>,
    pub resets: u32,
    pub render_version: u32,
    /// `(record id, delete_files)` per successful delete.
    pub deletes: Vec<(i64, bool)>,
}

pub type Shared = Arc<Mutex<FakeState>>;

pub struct FakeService {
    pub api_base: String,
    pub state: Shared,
}

impl FakeService {
    /// A client pointed at this fake.
    pub fn api(&self) -> DetectionApi {
        DetectionApi::with_client(reqwest::Client::new(), &self.api_base)
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

/// Seed 13 records cycling through image, video and camera, then serve.
pub async fn spawn() -> FakeService {
    let mut state = FakeState {
        next_record_id: 1,
        ..Default::default()
    };
    for i in 0..13 {
        let kind = ["image", "video", "camera"][i % 3];
        push_record(&mut state, kind, &format!("seed_{i}.bin"));
    }
    let state: Shared = Arc::new(Mutex::new(state));

    let app = Router::new()
        .route("/api/detect/image", post(detect_image))
        .route("/api/detect/video", post(detect_video))
        .route("/api/records/list", get(list_records))
        .route("/api/records/{id}", get(get_record).delete(delete_record))
        .route("/api/video/{id}/status", get(video_status))
        .route("/api/video/{id}/toggle-boxes", post(toggle_boxes))
        .route("/api/video/{id}/reset", post(reset_boxes))
        .route("/api/video/{id}/objects", get(video_objects))
        .route("/api/video/{id}/detections", get(video_detections))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake service");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve fake service");
    });

    FakeService {
        api_base: format!("http://{addr}/api"),
        state,
    }
}

fn push_record(state: &mut FakeState, kind: &str, filename: &str) -> i64 {
    let id = state.next_record_id;
    state.next_record_id += 1;
    state.records.insert(
        0,
        json!({
            "id": id,
            "type": kind,
            "filename": filename,
            "source_path": format!("/files/upload/{filename}"),
            "result_path": format!("/files/result/res_{filename}"),
            "detect_time": "2024-05-01T12:00:00",
            "objects": [],
        }),
    );
    id
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn error(status: StatusCode, detail: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": detail.to_string() })))
}

fn bad_request(e: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    error(StatusCode::BAD_REQUEST, e)
}

fn require_video(id: &str) -> Result<(), (StatusCode, Json<Value>)> {
    if id == VIDEO_ID {
        Ok(())
    } else {
        Err(error(StatusCode::NOT_FOUND, "Video session not found"))
    }
}

/// Read the multipart body, returning the `file` part's name and the
/// `conf` text field.
async fn read_upload(
    mut multipart: Multipart,
) -> Result<(Option<String>, Option<String>), (StatusCode, Json<Value>)> {
    let mut file_name = None;
    let mut conf = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                field.bytes().await.map_err(bad_request)?;
            }
            "conf" => conf = Some(field.text().await.map_err(bad_request)?),
            _ => {}
        }
    }
    Ok((file_name, conf))
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

async fn detect_image(State(state): State<Shared>, multipart: Multipart) -> ApiResult {
    let (file_name, _) = read_upload(multipart).await?;
    let file_name = file_name.unwrap_or_else(|| "image.jpg".into());
    let mut state = state.lock().unwrap();
    let id = push_record(&mut state, "image", &file_name);
    Ok(Json(json!({
        "id": id,
        "result_url": format!("/api/files/result/res_{file_name}"),
        "objects": [{ "class": "cat", "conf": 0.91, "bbox": [10, 20, 110, 220] }],
    })))
}

#[derive(Deserialize)]
struct ConfQuery {
    conf: Option<String>,
}

async fn detect_video(
    State(state): State<Shared>,
    Query(query): Query<ConfQuery>,
    multipart: Multipart,
) -> ApiResult {
    let (file_name, form_conf) = read_upload(multipart).await?;
    let mut state = state.lock().unwrap();
    let stored = file_name.clone().unwrap_or_else(|| "video.mp4".into());
    push_record(&mut state, "video", &stored);
    state
        .video_uploads
        .push((file_name, query.conf.clone(), form_conf));
    Ok(Json(json!({
        "session_id": VIDEO_ID,
        "status": "processing",
        "result_url": INITIAL_RESULT_URL,
        "message": "Video uploaded, processing in background",
        "config": { "confidence_threshold": query.conf, "filename": stored },
    })))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListQuery {
    page: Option<usize>,
    limit: Option<usize>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

async fn list_records(State(state): State<Shared>, Query(query): Query<ListQuery>) -> ApiResult {
    let state = state.lock().unwrap();
    let matching: Vec<&Value> = state
        .records
        .iter()
        .filter(|r| query.kind.as_deref().is_none_or(|k| r["type"] == k))
        .collect();
    let limit = query.limit.unwrap_or(8);

    match query.page {
        Some(page) => {
            let data: Vec<&Value> = matching
                .iter()
                .skip(page.saturating_sub(1) * limit)
                .take(limit)
                .copied()
                .collect();
            Ok(Json(json!({ "total": matching.len(), "data": data })))
        }
        None => {
            let data: Vec<&Value> = matching.into_iter().take(limit).collect();
            Ok(Json(json!(data)))
        }
    }
}

async fn get_record(State(state): State<Shared>, Path(id): Path<i64>) -> ApiResult {
    let state = state.lock().unwrap();
    state
        .records
        .iter()
        .find(|r| r["id"] == id)
        .map(|r| Json(r.clone()))
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Record not found"))
}

#[derive(Deserialize)]
struct DeleteQuery {
    delete_files: Option<bool>,
}

async fn delete_record(
    State(state): State<Shared>,
    Path(id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult {
    let mut state = state.lock().unwrap();
    let before = state.records.len();
    state.records.retain(|r| r["id"] != id);
    if state.records.len() == before {
        return Err(error(StatusCode::NOT_FOUND, "Record not found"));
    }
    let delete_files = query.delete_files.unwrap_or(false);
    state.deletes.push((id, delete_files));
    Ok(Json(json!({ "message": "Record deleted", "files_deleted": delete_files })))
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

async fn video_status(State(state): State<Shared>, Path(id): Path<String>) -> ApiResult {
    require_video(&id)?;
    let mut state = state.lock().unwrap();
    state.status_polls += 1;
    Ok(Json(match state.status_polls {
        1 => json!({ "status": "processing", "progress": 30.0 }),
        2 => json!({ "status": "processing", "progress": 75.5, "fps": 30.0, "total_frames": 900 }),
        _ => json!({ "status": "completed", "progress": 100, "result_url": INITIAL_RESULT_URL }),
    }))
}

async fn toggle_boxes(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult {
    require_video(&id)?;
    let mut hidden = Vec::new();
    let mut regenerate = false;
    for (key, value) in pairs {
        match key.as_str() {
            "hidden_ids" => hidden.push(value.parse::<u32>().map_err(bad_request)?),
            "regenerate" => regenerate = value == "true",
            _ => {}
        }
    }

    let mut state = state.lock().unwrap();
    state.toggles.push((hidden.clone(), regenerate));
    state.hidden = hidden.iter().copied().collect();

    if regenerate {
        state.render_version += 1;
        Ok(Json(json!({
            "regenerated": true,
            "result_url": format!("/api/files/result/res_{id}_v{}.mp4", state.render_version),
            "hidden_ids": state.hidden,
        })))
    } else {
        Ok(Json(json!({
            "regenerated": false,
            "hidden_ids": state.hidden,
            "message": "Hidden set updated",
        })))
    }
}

async fn reset_boxes(State(state): State<Shared>, Path(id): Path<String>) -> ApiResult {
    require_video(&id)?;
    let mut state = state.lock().unwrap();
    state.hidden.clear();
    state.resets += 1;
    Ok(Json(json!({ "message": "All boxes visible" })))
}

fn tracks() -> Value {
    json!([
        {
            "track_id": 5, "class": "car",
            "first_frame": 0, "last_frame": 420, "frames": 421, "confidence": 0.93
        },
        {
            "track_id": 9, "class": "person",
            "first_frame": 12, "last_frame": 300, "frames": 289, "confidence": 0.81
        },
        {
            "track_id": 14, "class": "bicycle",
            "first_frame": 500, "last_frame": 640, "frames": 141, "confidence": 0.66
        }
    ])
}

async fn video_objects(Path(id): Path<String>) -> ApiResult {
    require_video(&id)?;
    Ok(Json(json!({ "video_id": id, "objects": tracks() })))
}

#[derive(Deserialize)]
struct FrameQuery {
    frame_index: Option<u64>,
}

async fn video_detections(Path(id): Path<String>, Query(query): Query<FrameQuery>) -> ApiResult {
    require_video(&id)?;
    Ok(Json(match query.frame_index {
        Some(frame) => json!({
            "frame_index": frame,
            "detections": [
                { "track_id": 5, "class": "car", "conf": 0.9, "bbox": [1.0, 2.0, 30.0, 40.0] }
            ],
        }),
        None => json!({ "fps": 30.0, "total_frames": 900, "objects": tracks() }),
    }))
}
