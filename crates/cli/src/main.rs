//! `tracklens` -- command-line client for the detection service.
//!
//! Submits images and videos, tracks video processing, browses and
//! deletes history records, and manages hidden boxes for the current video
//! session. Results are printed to stdout as JSON; logs go to stderr.
//!
//! # Environment variables
//!
//! | Variable                         | Default                     | Description                         |
//! |----------------------------------|-----------------------------|-------------------------------------|
//! | `TRACKLENS_API_BASE`             | `http://127.0.0.1:8000/api` | API root of the detection service   |
//! | `TRACKLENS_SESSION_FILE`         | `video-detect-cache.json`   | Persisted video session             |
//! | `TRACKLENS_REQUEST_TIMEOUT_SECS` | `30`                        | Per-request deadline                |
//! | `TRACKLENS_UPLOAD_TIMEOUT_SECS`  | `600`                       | Upload and re-render deadline       |
//! | `TRACKLENS_POLL_INTERVAL_MS`     | `1000`                      | First delay between status polls    |
//! | `TRACKLENS_TRACK_DEADLINE_SECS`  | `3600`                      | Give up tracking after this long    |
//! | `RUST_LOG`                       | `tracklens=info,...`        | Log filter                          |

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tracklens_client::ClientConfig;
use tracklens_core::records::RecordType;
use tracklens_core::types::{RecordId, TrackId};

#[derive(Parser)]
#[command(name = "tracklens", version, about = "Client for the detection and tracking service")]
pub struct Cli {
    /// API root, e.g. http://host:8000/api. Overrides TRACKLENS_API_BASE.
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Where the video session is persisted. Overrides TRACKLENS_SESSION_FILE.
    #[arg(long, global = true)]
    pub session_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Detect objects in a still image.
    Image { path: PathBuf },

    /// Upload a video for tracking and make it the current session.
    Video {
        path: PathBuf,
        /// Confidence threshold in [0, 1].
        #[arg(long, default_value_t = tracklens_client::api::DEFAULT_CONFIDENCE)]
        conf: f64,
        /// Keep polling until processing completes.
        #[arg(long)]
        watch: bool,
    },

    /// Poll the current video session until it completes (Ctrl-C stops).
    Watch,

    /// List one page of history records.
    Records {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = tracklens_core::pagination::DEFAULT_PAGE_SIZE)]
        limit: u32,
        /// image, video, camera or camera_video.
        #[arg(long = "type")]
        kind: Option<RecordType>,
    },

    /// List the newest records without pagination.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long = "type")]
        kind: Option<RecordType>,
    },

    /// Show one record.
    Record { id: RecordId },

    /// Delete a record.
    Delete {
        id: RecordId,
        /// Also delete the source and result files.
        #[arg(long)]
        files: bool,
    },

    /// Hide boxes in the current video session.
    Boxes {
        #[command(subcommand)]
        action: BoxesAction,
    },

    /// Fetch tracked objects of the current video and merge them in.
    Objects {
        /// Fetch one frame's detections instead of the whole summary.
        #[arg(long)]
        frame: Option<u64>,
    },

    /// Live camera endpoints.
    Camera {
        #[command(subcommand)]
        action: CameraAction,
    },

    /// Detection model endpoints.
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Service host status.
    System {
        #[command(subcommand)]
        action: SystemAction,
    },

    /// Inspect or clear the local session.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
pub enum BoxesAction {
    /// Replace the hidden set with the given track IDs and send it.
    Apply {
        track_ids: Vec<TrackId>,
        /// Ask the service to re-render the annotated video.
        #[arg(long)]
        regenerate: bool,
    },
    /// Show every box again.
    Reset,
}

#[derive(Subcommand)]
pub enum CameraAction {
    /// Detect objects in one captured frame.
    Frame { path: PathBuf },
    /// Store a recorded clip as a record.
    Save { path: PathBuf },
    /// Start the camera with a JSON configuration.
    Start {
        #[arg(long, default_value = "{}")]
        config: String,
    },
    Stop,
    Status,
    List,
}

#[derive(Subcommand)]
pub enum ModelAction {
    Info,
    Classes,
    List,
    /// Load a different model file.
    Switch { model_path: String },
}

#[derive(Subcommand)]
pub enum SystemAction {
    Status,
    Gpu,
    Memory,
    Cpu,
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Print the persisted video session.
    Show,
    /// Reset the local session.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tracklens=info,tracklens_session=info,tracklens_client=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    if let Some(session_file) = cli.session_file {
        config.session_file = session_file;
    }

    tracing::debug!(
        api_base = %config.api_base,
        session_file = %config.session_file.display(),
        "Configuration loaded",
    );

    commands::run(cli.command, config).await
}
