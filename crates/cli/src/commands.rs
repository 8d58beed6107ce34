use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use tracklens_client::{ClientConfig, DetectionApi, MediaUpload};
use tracklens_core::pagination::PageRequest;
use tracklens_core::session::VideoUpdate;
use tracklens_session::paginator::Paginator;
use tracklens_session::reconciler::{ApplyOutcome, BoxVisibilityReconciler};
use tracklens_session::storage::FileStorage;
use tracklens_session::tracker::{track_video, TrackConfig};
use tracklens_session::SessionStore;

use crate::{BoxesAction, CameraAction, Command, ModelAction, SessionAction, SystemAction};

pub async fn run(command: Command, config: ClientConfig) -> anyhow::Result<()> {
    let api = DetectionApi::new(&config).context("Failed to build HTTP client")?;

    match command {
        Command::Image { path } => image(&api, &path).await,
        Command::Video { path, conf, watch } => video(&api, &config, &path, conf, watch).await,
        Command::Watch => {
            let mut store = open_store(&config)?;
            watch_video(&api, &config, &mut store).await
        }
        Command::Records { page, limit, kind } => {
            let paginator = Paginator::with_request(&api, PageRequest::new(page, limit)?, kind);
            paginator.load().await?;
            let window = paginator.window().await;
            print_json(&json!({
                "page": window.page_number(),
                "page_size": window.page_size(),
                "page_count": window.page_count(),
                "total": window.total_count(),
                "type": window.filter(),
                "items": window.items(),
            }))
        }
        Command::Recent { limit, kind } => print_json(&api.list_recent_records(limit, kind).await?),
        Command::Record { id } => {
            let record = api.get_record(id).await?;
            let urls = api.urls();
            print_json(&json!({
                "record": record,
                "source": record.source_url.as_deref().map(|p| urls.resolve(p)),
                "result": record.result_url.as_deref().map(|p| urls.resolve(p)),
            }))
        }
        Command::Delete { id, files } => print_json(&api.delete_record(id, files).await?),
        Command::Boxes { action } => boxes(&api, &config, action).await,
        Command::Objects { frame } => objects(&api, &config, frame).await,
        Command::Camera { action } => camera(&api, action).await,
        Command::Model { action } => print_json(&match action {
            ModelAction::Info => api.model_info().await?,
            ModelAction::Classes => api.model_classes().await?,
            ModelAction::List => api.model_list().await?,
            ModelAction::Switch { model_path } => api.switch_model(&model_path).await?,
        }),
        Command::System { action } => print_json(&match action {
            SystemAction::Status => api.system_status().await?,
            SystemAction::Gpu => api.gpu_status().await?,
            SystemAction::Memory => api.memory_status().await?,
            SystemAction::Cpu => api.cpu_status().await?,
        }),
        Command::Session { action } => {
            let mut store = open_store(&config)?;
            match action {
                SessionAction::Show => print_json(store.video()),
                SessionAction::Clear => {
                    store.clear_all()?;
                    tracing::info!(path = %config.session_file.display(), "Session cleared");
                    Ok(())
                }
            }
        }
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(config: &ClientConfig) -> anyhow::Result<SessionStore<FileStorage>> {
    SessionStore::open(FileStorage::new(&config.session_file)).with_context(|| {
        format!(
            "Failed to open session file {}",
            config.session_file.display()
        )
    })
}

async fn read_upload(path: &Path) -> anyhow::Result<MediaUpload> {
    MediaUpload::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn image(api: &DetectionApi, path: &Path) -> anyhow::Result<()> {
    let upload = read_upload(path).await?;
    let meta = upload.meta();
    tracing::info!(file = %meta.name, size = meta.size, "Submitting image");

    let result = api.submit_image(upload).await?;
    let result_url = result.result_url.as_deref().map(|p| api.urls().resolve(p));
    print_json(&json!({
        "id": result.id,
        "file": meta,
        "result_url": result_url,
        "objects": result.objects,
    }))
}

async fn video(
    api: &DetectionApi,
    config: &ClientConfig,
    path: &Path,
    conf: f64,
    watch: bool,
) -> anyhow::Result<()> {
    let upload = read_upload(path).await?;
    let mut store = open_store(config)?;
    if store.video().is_in_flight() {
        tracing::warn!(
            session_id = %store.video().session_id,
            "Replacing a video session that is still processing",
        );
    }

    let meta = upload.meta();
    let submission = api.submit_video(upload, conf).await?;
    store.start_video(meta, &submission)?;
    tracing::info!(
        session_id = %store.video().session_id,
        message = ?submission.message,
        "Video accepted",
    );
    print_json(&submission)?;

    if watch {
        watch_video(api, config, &mut store).await?;
    }
    Ok(())
}

async fn watch_video(
    api: &DetectionApi,
    config: &ClientConfig,
    store: &mut SessionStore<FileStorage>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let track_config = TrackConfig::from_client_config(config);
    match track_video(api, store, &track_config, &cancel).await? {
        Some(_) => {
            let video = store.video();
            print_json(&json!({
                "session_id": video.session_id,
                "status": video.status,
                "progress": video.progress,
                "media_info": video.media_info,
                "result_url": api.urls().resolve(&video.result_url),
            }))
        }
        None => {
            tracing::info!("Tracking stopped; resume with `tracklens watch`");
            Ok(())
        }
    }
}

async fn boxes(
    api: &DetectionApi,
    config: &ClientConfig,
    action: BoxesAction,
) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let mut reconciler = BoxVisibilityReconciler::for_session(&store, api)?;

    match action {
        BoxesAction::Apply {
            track_ids,
            regenerate,
        } => {
            for id in track_ids {
                reconciler.hide(id);
            }
            let outcome = reconciler.apply(&mut store, regenerate).await?;
            let summary = match outcome {
                ApplyOutcome::MetadataOnly => json!({ "regenerated": false }),
                ApplyOutcome::Regenerated { result_url } => json!({
                    "regenerated": true,
                    "result_url": api.urls().resolve(&result_url),
                }),
                ApplyOutcome::NotRegenerated { message } => json!({
                    "regenerated": false,
                    "message": message,
                }),
            };
            print_json(&json!({
                "video_id": reconciler.video_id(),
                "hidden_ids": reconciler.hidden_ids(),
                "outcome": summary,
            }))
        }
        BoxesAction::Reset => {
            let ack = reconciler.reset(&mut store).await?;
            print_json(&json!({
                "ack": ack,
                "result_url": api.urls().resolve(&store.video().result_url),
            }))
        }
    }
}

async fn objects(
    api: &DetectionApi,
    config: &ClientConfig,
    frame: Option<u64>,
) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let video_id = store.video().require_session_id()?.to_string();

    let update = match frame {
        Some(frame) => {
            VideoUpdate::from_detections(&api.get_video_detections(&video_id, Some(frame)).await?)
        }
        None => VideoUpdate::from_objects(api.get_video_objects(&video_id).await?),
    };
    store.apply_video_update(update)?;
    print_json(&store.video().objects)
}

async fn camera(api: &DetectionApi, action: CameraAction) -> anyhow::Result<()> {
    match action {
        CameraAction::Frame { path } => {
            let upload = read_upload(&path).await?;
            print_json(&api.post_camera_frame(upload).await?)
        }
        CameraAction::Save { path } => {
            let upload = read_upload(&path).await?;
            print_json(&api.save_camera_clip(upload).await?)
        }
        CameraAction::Start { config } => {
            let config: Value =
                serde_json::from_str(&config).context("Camera config must be JSON")?;
            print_json(&api.start_camera(&config).await?)
        }
        CameraAction::Stop => print_json(&api.stop_camera().await?),
        CameraAction::Status => print_json(&api.camera_status().await?),
        CameraAction::List => print_json(&api.camera_list().await?),
    }
}
