//! Owned holder of the current detection session.
//!
//! The store is the only writer of [`DetectionSession`]. Every operation
//! that touches the video half commits the serialized [`VideoSession`] and
//! only then swaps it in, so memory never runs ahead of storage. The image
//! half lives in memory only.

use tracklens_core::session::{
    DetectionSession, ImageDetection, ImageSession, MediaFileMeta, VideoSession, VideoUpdate,
};
use tracklens_core::video::VideoSubmission;

use crate::error::SessionError;
use crate::storage::{SessionStorage, StorageError};

pub struct SessionStore<S: SessionStorage> {
    session: DetectionSession,
    storage: S,
}

impl<S: SessionStorage> SessionStore<S> {
    /// Open a store, rehydrating the video half from `storage`.
    ///
    /// A blob that no longer deserializes is discarded with a warning and
    /// the video half starts empty.
    pub fn open(storage: S) -> Result<Self, SessionError> {
        let video = match storage.load()? {
            Some(blob) => match serde_json::from_slice::<VideoSession>(&blob) {
                Ok(video) => {
                    tracing::info!(
                        session_id = %video.session_id,
                        status = ?video.status,
                        progress = video.progress,
                        "Rehydrated video session",
                    );
                    video
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable persisted video session");
                    VideoSession::default()
                }
            },
            None => VideoSession::default(),
        };

        Ok(Self {
            session: DetectionSession {
                image: ImageSession::default(),
                video,
            },
            storage,
        })
    }

    /// Final commit, then hand the storage back.
    pub fn close(mut self) -> Result<S, SessionError> {
        self.commit()?;
        Ok(self.storage)
    }

    pub fn session(&self) -> &DetectionSession {
        &self.session
    }

    pub fn image(&self) -> &ImageSession {
        &self.session.image
    }

    pub fn video(&self) -> &VideoSession {
        &self.session.video
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // ---- image half ----

    /// Reset image fields only. Video fields and progress are untouched.
    pub fn clear_image_session(&mut self) {
        self.session.clear_image();
    }

    /// Start a new image analysis, replacing the previous one.
    pub fn begin_image(&mut self, meta: MediaFileMeta, original_url: impl Into<String>) {
        self.session.clear_image();
        self.session.image.file_meta = Some(meta);
        self.session.image.original_url = original_url.into();
    }

    pub fn record_image_result(&mut self, result: ImageDetection) {
        if let Some(url) = result.result_url.as_deref() {
            self.session.image.result_url = url.to_string();
        }
        self.session.image.result = Some(result);
    }

    // ---- video half ----

    /// Reset every video field, progress included.
    pub fn clear_video_session(&mut self) -> Result<(), SessionError> {
        self.update_video(|video| *video = VideoSession::default())
    }

    pub fn clear_all(&mut self) -> Result<(), SessionError> {
        self.clear_video_session()?;
        self.session.clear_image();
        Ok(())
    }

    /// Start a new video analysis, replacing the previous one.
    pub fn begin_video(&mut self, meta: MediaFileMeta) -> Result<(), SessionError> {
        self.update_video(|video| {
            *video = VideoSession::default();
            video.file_meta = Some(meta);
        })
    }

    /// Replace the video half with an upload the server has accepted.
    ///
    /// Nothing is written until the acknowledgement is in hand, so a rejected
    /// upload leaves the previous session untouched.
    pub fn start_video(
        &mut self,
        meta: MediaFileMeta,
        submission: &VideoSubmission,
    ) -> Result<(), SessionError> {
        self.update_video(|video| {
            *video = VideoSession::default();
            video.file_meta = Some(meta);
            video.apply(VideoUpdate::from_submission(submission));
        })
    }

    /// Merge a partial server payload into the video half.
    pub fn apply_video_update(&mut self, update: VideoUpdate) -> Result<(), SessionError> {
        if update.is_empty() {
            return Ok(());
        }
        self.update_video(|video| video.apply(update))
    }

    /// Show a re-rendered artifact, keeping the all-visible one for later.
    pub fn replace_result_url(&mut self, url: impl Into<String>) -> Result<(), SessionError> {
        let url = url.into();
        self.update_video(|video| video.replace_result_url(url))
    }

    /// Go back to the all-visible artifact, if a re-render replaced it.
    pub fn restore_original_result(&mut self) -> Result<bool, SessionError> {
        if self.session.video.original_result_url.is_none() {
            return Ok(false);
        }
        self.update_video(|video| {
            video.restore_original_result();
        })?;
        Ok(true)
    }

    /// Write the video half to storage.
    pub fn commit(&mut self) -> Result<(), SessionError> {
        persist(&mut self.storage, &self.session.video)
    }

    /// Change a copy of the video half and keep it only once it is stored.
    fn update_video(
        &mut self,
        change: impl FnOnce(&mut VideoSession),
    ) -> Result<(), SessionError> {
        let mut next = self.session.video.clone();
        change(&mut next);
        persist(&mut self.storage, &next)?;
        self.session.video = next;
        Ok(())
    }
}

fn persist<S: SessionStorage>(storage: &mut S, video: &VideoSession) -> Result<(), SessionError> {
    let blob = serde_json::to_vec(video).map_err(StorageError::from)?;
    storage.save(&blob)?;
    tracing::debug!(
        session_id = %video.session_id,
        bytes = blob.len(),
        "Committed video session",
    );
    Ok(())
}
