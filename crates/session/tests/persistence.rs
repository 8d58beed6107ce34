//! Session persistence across simulated restarts.

use tracklens_core::session::{ImageDetection, MediaFileMeta, VideoUpdate};
use tracklens_core::video::{TrackSummary, VideoStatus};
use tracklens_session::storage::{FileStorage, SessionStorage};
use tracklens_session::SessionStore;

fn populate(store: &mut SessionStore<FileStorage>) {
    store.begin_image(
        MediaFileMeta {
            name: "kitchen_cat.jpg".into(),
            size: 52_000,
            mime_type: "image/jpeg".into(),
        },
        "http://host:8000/files/upload/kitchen_cat.jpg",
    );
    store.record_image_result(ImageDetection {
        id: Some(31),
        result_url: Some("/files/result/res_kitchen_cat.jpg".into()),
        objects: vec![],
    });

    store
        .begin_video(MediaFileMeta {
            name: "street.mp4".into(),
            size: 8_000_000,
            mime_type: "video/mp4".into(),
        })
        .unwrap();
    store
        .apply_video_update(VideoUpdate {
            session_id: Some("abc123".into()),
            result_url: Some("/api/files/result/res_abc123.mp4".into()),
            status: Some(VideoStatus::Processing),
            raw_response: Some(serde_json::json!({ "status": "processing", "progress": 42.5 })),
            objects: Some(vec![TrackSummary {
                track_id: 5,
                class_name: "car".into(),
                first_frame: Some(0),
                last_frame: Some(88),
                frame_count: Some(89),
                max_confidence: Some(0.9),
            }]),
            fps: Some(29.97),
            total_frames: Some(1800),
            progress: Some(43),
        })
        .unwrap();
}

#[test]
fn video_half_survives_restart_byte_for_byte() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("video-detect-cache.json");

    let mut store = SessionStore::open(FileStorage::new(&path)).unwrap();
    populate(&mut store);
    let video_before = store.video().clone();
    let storage = store.close().unwrap();
    let blob_before = storage.load().unwrap().unwrap();

    let mut reopened = SessionStore::open(FileStorage::new(&path)).unwrap();
    assert_eq!(reopened.video(), &video_before);
    assert!(reopened.image().is_empty());

    reopened.commit().unwrap();
    let blob_after = std::fs::read(&path).unwrap();
    assert_eq!(blob_before, blob_after);
}

#[test]
fn image_fields_are_absent_from_blob() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("video-detect-cache.json");

    let mut store = SessionStore::open(FileStorage::new(&path)).unwrap();
    populate(&mut store);
    store.close().unwrap();

    let blob = std::fs::read_to_string(&path).unwrap();
    assert!(!blob.contains("kitchen_cat"));
    assert!(blob.contains("abc123"));
}

#[test]
fn clearing_video_persists_the_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("video-detect-cache.json");

    let mut store = SessionStore::open(FileStorage::new(&path)).unwrap();
    populate(&mut store);
    store.clear_video_session().unwrap();
    assert_eq!(store.image().file_meta.as_ref().unwrap().name, "kitchen_cat.jpg");
    drop(store);

    let reopened = SessionStore::open(FileStorage::new(&path)).unwrap();
    assert!(!reopened.video().has_session_id());
    assert_eq!(reopened.video().progress, 0);
    assert_eq!(reopened.video().media_info.fps, 25.0);
}

#[test]
fn clear_image_keeps_persisted_progress() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("video-detect-cache.json");

    let mut store = SessionStore::open(FileStorage::new(&path)).unwrap();
    populate(&mut store);
    let video_before = store.video().clone();
    store.clear_image_session();

    assert!(store.image().is_empty());
    assert_eq!(store.video(), &video_before);
    assert_eq!(store.video().progress, 43);
}
