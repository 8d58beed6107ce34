//! Per-video override of which tracked objects are drawn.
//!
//! The hidden set is client intent only. Whether a rendered artifact
//! matching that intent exists is decided by the server; the state keeps the
//! artifact location only while it is known to match the current set.

use std::collections::BTreeSet;

use crate::error::CoreError;
use crate::types::TrackId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxVisibilityState {
    video_id: String,
    hidden_track_ids: BTreeSet<TrackId>,
    regenerate_requested: bool,
    resolved_result_url: Option<String>,
}

impl BoxVisibilityState {
    /// Start with every box visible. `video_id` must be non-empty.
    pub fn new(video_id: impl Into<String>) -> Result<Self, CoreError> {
        let video_id = video_id.into();
        if video_id.is_empty() {
            return Err(CoreError::Precondition(
                "box visibility needs a video session id".into(),
            ));
        }
        Ok(Self {
            video_id,
            hidden_track_ids: BTreeSet::new(),
            regenerate_requested: false,
            resolved_result_url: None,
        })
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Hide a track. Returns `false` if it was already hidden.
    pub fn hide(&mut self, track_id: TrackId) -> bool {
        let inserted = self.hidden_track_ids.insert(track_id);
        if inserted {
            self.resolved_result_url = None;
        }
        inserted
    }

    /// Show a track again. Returns `false` if it was not hidden.
    pub fn show(&mut self, track_id: TrackId) -> bool {
        let removed = self.hidden_track_ids.remove(&track_id);
        if removed {
            self.resolved_result_url = None;
        }
        removed
    }

    pub fn is_hidden(&self, track_id: TrackId) -> bool {
        self.hidden_track_ids.contains(&track_id)
    }

    /// Hidden IDs in ascending order, the form sent over the wire.
    pub fn hidden_ids(&self) -> Vec<TrackId> {
        self.hidden_track_ids.iter().copied().collect()
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden_track_ids.len()
    }

    pub fn regenerate_requested(&self) -> bool {
        self.regenerate_requested
    }

    /// Mark the start of a toggle request.
    pub fn begin_request(&mut self, regenerate: bool) {
        self.regenerate_requested = regenerate;
    }

    /// Mark the end of a toggle request.
    ///
    /// `confirmed_url` is the artifact the server rendered for the current
    /// set, if it rendered one.
    pub fn finish_request(&mut self, confirmed_url: Option<String>) {
        if self.regenerate_requested {
            if let Some(url) = confirmed_url {
                self.resolved_result_url = Some(url);
            }
        }
        self.regenerate_requested = false;
    }

    /// Artifact known to match the current hidden set.
    pub fn resolved_result_url(&self) -> Option<&str> {
        self.resolved_result_url.as_deref()
    }

    /// Back to "all visible".
    pub fn clear(&mut self) {
        self.hidden_track_ids.clear();
        self.resolved_result_url = None;
        self.regenerate_requested = false;
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_video_id_is_rejected() {
        assert_matches!(BoxVisibilityState::new(""), Err(CoreError::Precondition(_)));
    }

    #[test]
    fn hide_twice_does_not_accumulate() {
        let mut state = BoxVisibilityState::new("abc123").unwrap();
        assert!(state.hide(7));
        assert!(state.hide(3));
        assert!(!state.hide(7));
        assert_eq!(state.hidden_ids(), vec![3, 7]);
    }

    #[test]
    fn show_unknown_track_is_noop() {
        let mut state = BoxVisibilityState::new("abc123").unwrap();
        assert!(!state.show(1));
        assert_eq!(state.hidden_count(), 0);
    }

    #[test]
    fn confirmed_regenerate_resolves_url() {
        let mut state = BoxVisibilityState::new("abc123").unwrap();
        state.hide(5);
        state.begin_request(true);
        assert!(state.regenerate_requested());
        state.finish_request(Some("/files/result/v2.mp4".into()));
        assert!(!state.regenerate_requested());
        assert_eq!(state.resolved_result_url(), Some("/files/result/v2.mp4"));
    }

    #[test]
    fn metadata_only_toggle_does_not_resolve_url() {
        let mut state = BoxVisibilityState::new("abc123").unwrap();
        state.begin_request(false);
        state.finish_request(Some("/files/result/v2.mp4".into()));
        assert_eq!(state.resolved_result_url(), None);
    }

    #[test]
    fn changing_the_set_invalidates_resolved_url() {
        let mut state = BoxVisibilityState::new("abc123").unwrap();
        state.begin_request(true);
        state.finish_request(Some("/files/result/v2.mp4".into()));
        state.hide(9);
        assert_eq!(state.resolved_result_url(), None);
    }

    #[test]
    fn clear_shows_everything() {
        let mut state = BoxVisibilityState::new("abc123").unwrap();
        state.hide(1);
        state.hide(2);
        state.clear();
        assert!(state.hidden_ids().is_empty());
        assert!(!state.is_hidden(1));
    }
}
