//! Poll a video's processing status until the server finishes it.
//!
//! Polling backs off exponentially and is bounded by an overall deadline.
//! Every poll is folded into the [`SessionStore`], so progress survives a
//! restart and tracking can resume without re-uploading.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use tracklens_client::{ApiError, ClientConfig};
use tracklens_core::session::VideoUpdate;
use tracklens_core::video::{VideoStatus, VideoStatusResponse};

use crate::error::SessionError;
use crate::ports::VideoStatusSource;
use crate::storage::SessionStorage;
use crate::store::SessionStore;

/// Tunable parameters for status polling.
#[derive(Debug, Clone)]
pub struct TrackConfig {
    /// Delay after the first poll.
    pub initial_interval: Duration,
    /// Upper bound on the delay between polls.
    pub max_interval: Duration,
    /// Factor by which the delay grows after each poll.
    pub multiplier: f64,
    /// Give up once this much time has passed since tracking started.
    pub deadline: Duration,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            multiplier: 1.5,
            deadline: Duration::from_secs(3600),
        }
    }
}

impl TrackConfig {
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            initial_interval: config.poll_interval,
            max_interval: config.poll_interval.max(Self::default().max_interval),
            deadline: config.track_deadline,
            ..Self::default()
        }
    }
}

/// Next polling delay, clamped to [`TrackConfig::max_interval`].
pub fn next_interval(current: Duration, config: &TrackConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_interval)
}

/// Track the store's current video session until it completes.
///
/// Returns `Some(status)` with the completing poll, or `None` if `cancel`
/// fires first. A `failed` status is recorded in the store and returned as
/// [`ApiError::ProcessingFailed`].
pub async fn track_video<V, S>(
    source: &V,
    store: &mut SessionStore<S>,
    config: &TrackConfig,
    cancel: &CancellationToken,
) -> Result<Option<VideoStatusResponse>, SessionError>
where
    V: VideoStatusSource,
    S: SessionStorage,
{
    let video_id = store.video().require_session_id()?.to_string();
    let started = Instant::now();
    let mut delay = config.initial_interval;
    let mut polls = 0u32;

    loop {
        polls += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(video_id = %video_id, polls, "Video tracking cancelled");
                return Ok(None);
            }
            result = source.get_video_status(&video_id) => result,
        };

        match result {
            Ok(status) => {
                store.apply_video_update(VideoUpdate::from_status(&status))?;
                tracing::debug!(
                    video_id = %video_id,
                    status = ?status.status,
                    progress = store.video().progress,
                    "Video status polled",
                );
                if status.status == VideoStatus::Completed {
                    tracing::info!(
                        video_id = %video_id,
                        polls,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Video processing complete",
                    );
                    return Ok(Some(status));
                }
            }
            Err(e @ ApiError::ProcessingFailed { .. }) => {
                store.apply_video_update(VideoUpdate {
                    status: Some(VideoStatus::Failed),
                    ..Default::default()
                })?;
                tracing::warn!(video_id = %video_id, error = %e, "Video processing failed");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }

        let waited = started.elapsed();
        if waited + delay > config.deadline {
            tracing::warn!(video_id = %video_id, polls, "Video tracking deadline passed");
            return Err(SessionError::Timeout { video_id, waited });
        }

        // Wait before the next poll, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_interval(delay, config);
    }
}
