//! Client intent about hidden boxes, reconciled with the rendered video.
//!
//! Hiding and showing tracks is local. [`BoxVisibilityReconciler::apply`]
//! sends the whole hidden set to the server, optionally asking it to
//! re-render the annotated video. The store's `result_url` only moves when
//! the server confirms it rendered a new artifact, and a reset moves it back
//! to the all-visible render.

use serde_json::Value;

use tracklens_core::error::CoreError;
use tracklens_core::types::TrackId;
use tracklens_core::visibility::BoxVisibilityState;

use crate::error::SessionError;
use crate::ports::VideoBoxControl;
use crate::storage::SessionStorage;
use crate::store::SessionStore;

/// Result of sending the hidden set to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Only the server's hidden set was updated; nothing was re-rendered.
    MetadataOnly,
    /// The server rendered a new artifact for the current set.
    Regenerated { result_url: String },
    /// Regeneration was asked for but the server did not confirm one.
    /// The session's `result_url` is unchanged.
    NotRegenerated { message: Option<String> },
}

pub struct BoxVisibilityReconciler<C: VideoBoxControl> {
    control: C,
    state: BoxVisibilityState,
}

impl<C: VideoBoxControl> BoxVisibilityReconciler<C> {
    /// Bind to the store's current video session.
    ///
    /// Fails without contacting the server when the session has no
    /// server-issued id yet.
    pub fn for_session<S: SessionStorage>(
        store: &SessionStore<S>,
        control: C,
    ) -> Result<Self, SessionError> {
        let video_id = store.video().require_session_id()?;
        Ok(Self {
            state: BoxVisibilityState::new(video_id)?,
            control,
        })
    }

    pub fn video_id(&self) -> &str {
        self.state.video_id()
    }

    pub fn state(&self) -> &BoxVisibilityState {
        &self.state
    }

    pub fn hide(&mut self, track_id: TrackId) -> bool {
        self.state.hide(track_id)
    }

    pub fn show(&mut self, track_id: TrackId) -> bool {
        self.state.show(track_id)
    }

    pub fn hidden_ids(&self) -> Vec<TrackId> {
        self.state.hidden_ids()
    }

    /// Send the current hidden set.
    pub async fn apply<S: SessionStorage>(
        &mut self,
        store: &mut SessionStore<S>,
        regenerate: bool,
    ) -> Result<ApplyOutcome, SessionError> {
        self.ensure_same_session(store)?;
        let hidden_ids = self.state.hidden_ids();

        self.state.begin_request(regenerate);
        let response = match self
            .control
            .toggle_video_boxes(self.state.video_id(), &hidden_ids, regenerate)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.state.finish_request(None);
                return Err(e.into());
            }
        };

        let confirmed = response.confirmed_artifact().map(str::to_string);
        self.state.finish_request(confirmed.clone());

        if !regenerate {
            return Ok(ApplyOutcome::MetadataOnly);
        }

        match confirmed {
            Some(result_url) => {
                store.replace_result_url(result_url.as_str())?;
                tracing::info!(
                    video_id = %self.state.video_id(),
                    hidden = ?hidden_ids,
                    result_url = %result_url,
                    "Regenerated annotated video",
                );
                Ok(ApplyOutcome::Regenerated { result_url })
            }
            None => {
                tracing::warn!(
                    video_id = %self.state.video_id(),
                    message = ?response.message,
                    "Server did not confirm regeneration, keeping current result",
                );
                Ok(ApplyOutcome::NotRegenerated {
                    message: response.message,
                })
            }
        }
    }

    /// Clear every override on the server, then locally.
    ///
    /// A session showing a re-rendered artifact goes back to the render it
    /// had before any boxes were hidden.
    pub async fn reset<S: SessionStorage>(
        &mut self,
        store: &mut SessionStore<S>,
    ) -> Result<Value, SessionError> {
        self.ensure_same_session(store)?;
        let ack = self
            .control
            .reset_video_boxes(self.state.video_id())
            .await?;
        self.state.clear();
        let restored = store.restore_original_result()?;
        tracing::info!(
            video_id = %self.state.video_id(),
            restored,
            result_url = %store.video().result_url,
            "Box visibility reset",
        );
        Ok(ack)
    }

    fn ensure_same_session<S: SessionStorage>(
        &self,
        store: &SessionStore<S>,
    ) -> Result<(), SessionError> {
        if store.video().session_id != self.state.video_id() {
            return Err(CoreError::Precondition(format!(
                "video session changed from {} to {:?}",
                self.state.video_id(),
                store.video().session_id,
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use tracklens_client::ApiError;
    use tracklens_core::session::VideoUpdate;
    use tracklens_core::video::ToggleBoxesResponse;

    use super::*;
    use crate::storage::MemoryStorage;

    /// Records every call and answers toggles with a fixed response.
    #[derive(Default)]
    struct FakeControl {
        calls: Mutex<Vec<(Vec<TrackId>, bool)>>,
        resets: Mutex<u32>,
        confirm_regenerate: bool,
    }

    impl VideoBoxControl for FakeControl {
        async fn toggle_video_boxes(
            &self,
            _video_id: &str,
            hidden_ids: &[TrackId],
            regenerate: bool,
        ) -> Result<ToggleBoxesResponse, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push((hidden_ids.to_vec(), regenerate));
            let regenerated = regenerate && self.confirm_regenerate;
            Ok(ToggleBoxesResponse {
                regenerated,
                result_url: regenerated.then(|| "/api/files/result/res_v2.mp4".to_string()),
                hidden_ids: hidden_ids.to_vec(),
                message: (!regenerated).then(|| "metadata updated".to_string()),
                ..Default::default()
            })
        }

        async fn reset_video_boxes(&self, _video_id: &str) -> Result<Value, ApiError> {
            *self.resets.lock().unwrap() += 1;
            Ok(serde_json::json!({ "message": "reset" }))
        }
    }

    fn store_with_session() -> SessionStore<MemoryStorage> {
        let mut store = SessionStore::open(MemoryStorage::new()).unwrap();
        store
            .apply_video_update(VideoUpdate {
                session_id: Some("abc123".into()),
                result_url: Some("/api/files/result/res_v1.mp4".into()),
                ..Default::default()
            })
            .unwrap();
        store
    }

    #[test]
    fn construction_requires_session_id() {
        let store = SessionStore::open(MemoryStorage::new()).unwrap();
        let control = FakeControl::default();
        let result = BoxVisibilityReconciler::for_session(&store, &control);
        assert!(result.as_ref().is_err_and(SessionError::is_precondition));
        assert!(control.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn metadata_only_apply_is_idempotent() {
        let mut store = store_with_session();
        let control = FakeControl::default();
        let mut reconciler = BoxVisibilityReconciler::for_session(&store, &control).unwrap();
        reconciler.hide(7);
        reconciler.hide(3);

        let before = store.video().clone();
        assert_eq!(
            reconciler.apply(&mut store, false).await.unwrap(),
            ApplyOutcome::MetadataOnly
        );
        assert_eq!(
            reconciler.apply(&mut store, false).await.unwrap(),
            ApplyOutcome::MetadataOnly
        );

        let calls = control.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (vec![3, 7], false));
        assert_eq!(calls[0], calls[1]);
        assert_eq!(store.video(), &before);
    }

    #[tokio::test]
    async fn confirmed_regenerate_updates_result_url() {
        let mut store = store_with_session();
        let control = FakeControl {
            confirm_regenerate: true,
            ..Default::default()
        };
        let mut reconciler = BoxVisibilityReconciler::for_session(&store, &control).unwrap();
        reconciler.hide(5);

        let outcome = reconciler.apply(&mut store, true).await.unwrap();
        assert_matches!(
            outcome,
            ApplyOutcome::Regenerated { ref result_url }
                if result_url == "/api/files/result/res_v2.mp4"
        );
        assert_eq!(store.video().result_url, "/api/files/result/res_v2.mp4");
        assert_eq!(
            reconciler.state().resolved_result_url(),
            Some("/api/files/result/res_v2.mp4")
        );
    }

    #[tokio::test]
    async fn unconfirmed_regenerate_keeps_result_url() {
        let mut store = store_with_session();
        let control = FakeControl::default();
        let mut reconciler = BoxVisibilityReconciler::for_session(&store, &control).unwrap();
        reconciler.hide(5);

        let outcome = reconciler.apply(&mut store, true).await.unwrap();
        assert_matches!(outcome, ApplyOutcome::NotRegenerated { .. });
        assert_eq!(store.video().result_url, "/api/files/result/res_v1.mp4");
        assert_eq!(reconciler.state().resolved_result_url(), None);
    }

    #[tokio::test]
    async fn reset_clears_local_set() {
        let mut store = store_with_session();
        let control = FakeControl::default();
        let mut reconciler = BoxVisibilityReconciler::for_session(&store, &control).unwrap();
        reconciler.hide(1);
        reconciler.hide(2);

        reconciler.reset(&mut store).await.unwrap();
        assert!(reconciler.hidden_ids().is_empty());
        assert_eq!(*control.resets.lock().unwrap(), 1);
        assert_eq!(store.video().result_url, "/api/files/result/res_v1.mp4");
    }

    #[tokio::test]
    async fn reset_after_regenerate_restores_original_render() {
        let mut store = store_with_session();
        let control = FakeControl {
            confirm_regenerate: true,
            ..Default::default()
        };
        let mut reconciler = BoxVisibilityReconciler::for_session(&store, &control).unwrap();
        reconciler.hide(5);
        reconciler.apply(&mut store, true).await.unwrap();
        reconciler.hide(6);
        reconciler.apply(&mut store, true).await.unwrap();
        assert_eq!(store.video().result_url, "/api/files/result/res_v2.mp4");

        reconciler.reset(&mut store).await.unwrap();
        assert_eq!(store.video().result_url, "/api/files/result/res_v1.mp4");
        assert_eq!(store.video().original_result_url, None);

        let persisted: tracklens_core::session::VideoSession =
            serde_json::from_slice(store.storage().blob().unwrap()).unwrap();
        assert_eq!(persisted.result_url, "/api/files/result/res_v1.mp4");
    }

    #[tokio::test]
    async fn reset_restores_render_from_an_earlier_run() {
        let mut store = store_with_session();
        let control = FakeControl {
            confirm_regenerate: true,
            ..Default::default()
        };
        let mut first = BoxVisibilityReconciler::for_session(&store, &control).unwrap();
        first.hide(5);
        first.apply(&mut store, true).await.unwrap();

        let storage = store.close().unwrap();
        let mut store = SessionStore::open(storage).unwrap();
        let mut second = BoxVisibilityReconciler::for_session(&store, &control).unwrap();
        second.reset(&mut store).await.unwrap();
        assert_eq!(store.video().result_url, "/api/files/result/res_v1.mp4");
    }

    #[tokio::test]
    async fn apply_after_session_change_is_rejected() {
        let mut store = store_with_session();
        let control = FakeControl::default();
        let mut reconciler = BoxVisibilityReconciler::for_session(&store, &control).unwrap();
        store.clear_video_session().unwrap();

        let result = reconciler.apply(&mut store, false).await;
        assert!(result.is_err_and(|e| e.is_precondition()));
        assert!(control.calls.lock().unwrap().is_empty());
    }
}
