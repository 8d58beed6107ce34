//! Seams between the session controllers and the transport.
//!
//! [`DetectionApi`] implements every trait here; tests substitute fakes.

use std::future::Future;

use serde_json::Value;

use tracklens_client::{ApiError, DetectionApi};
use tracklens_core::pagination::PageRequest;
use tracklens_core::records::{RecordPage, RecordType};
use tracklens_core::types::TrackId;
use tracklens_core::video::{ToggleBoxesResponse, VideoStatusResponse};

/// Any paginated record listing.
pub trait RecordLister: Send + Sync {
    fn list_records(
        &self,
        page: PageRequest,
        type_filter: Option<RecordType>,
    ) -> impl Future<Output = Result<RecordPage, ApiError>> + Send;
}

/// Server-side control of which tracks are drawn in a rendered video.
pub trait VideoBoxControl: Send + Sync {
    fn toggle_video_boxes(
        &self,
        video_id: &str,
        hidden_ids: &[TrackId],
        regenerate: bool,
    ) -> impl Future<Output = Result<ToggleBoxesResponse, ApiError>> + Send;

    fn reset_video_boxes(
        &self,
        video_id: &str,
    ) -> impl Future<Output = Result<Value, ApiError>> + Send;
}

/// Processing status of an uploaded video.
pub trait VideoStatusSource: Send + Sync {
    fn get_video_status(
        &self,
        video_id: &str,
    ) -> impl Future<Output = Result<VideoStatusResponse, ApiError>> + Send;
}

// ---------------------------------------------------------------------------
// Transport implementations
// ---------------------------------------------------------------------------

impl RecordLister for DetectionApi {
    async fn list_records(
        &self,
        page: PageRequest,
        type_filter: Option<RecordType>,
    ) -> Result<RecordPage, ApiError> {
        DetectionApi::list_records(self, page, type_filter).await
    }
}

impl VideoBoxControl for DetectionApi {
    async fn toggle_video_boxes(
        &self,
        video_id: &str,
        hidden_ids: &[TrackId],
        regenerate: bool,
    ) -> Result<ToggleBoxesResponse, ApiError> {
        DetectionApi::toggle_video_boxes(self, video_id, hidden_ids, regenerate).await
    }

    async fn reset_video_boxes(&self, video_id: &str) -> Result<Value, ApiError> {
        DetectionApi::reset_video_boxes(self, video_id).await
    }
}

impl VideoStatusSource for DetectionApi {
    async fn get_video_status(&self, video_id: &str) -> Result<VideoStatusResponse, ApiError> {
        DetectionApi::get_video_status(self, video_id).await
    }
}

impl<T: RecordLister> RecordLister for &T {
    fn list_records(
        &self,
        page: PageRequest,
        type_filter: Option<RecordType>,
    ) -> impl Future<Output = Result<RecordPage, ApiError>> + Send {
        (**self).list_records(page, type_filter)
    }
}

impl<T: VideoBoxControl> VideoBoxControl for &T {
    fn toggle_video_boxes(
        &self,
        video_id: &str,
        hidden_ids: &[TrackId],
        regenerate: bool,
    ) -> impl Future<Output = Result<ToggleBoxesResponse, ApiError>> + Send {
        (**self).toggle_video_boxes(video_id, hidden_ids, regenerate)
    }

    fn reset_video_boxes(
        &self,
        video_id: &str,
    ) -> impl Future<Output = Result<Value, ApiError>> + Send {
        (**self).reset_video_boxes(video_id)
    }
}

impl<T: VideoStatusSource> VideoStatusSource for &T {
    fn get_video_status(
        &self,
        video_id: &str,
    ) -> impl Future<Output = Result<VideoStatusResponse, ApiError>> + Send {
        (**self).get_video_status(video_id)
    }
}
