use std::time::Duration;

use tracklens_client::ApiError;
use tracklens_core::error::CoreError;

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),

    /// The video was still processing when the tracking deadline passed.
    #[error("Video {video_id} still processing after {waited:?}")]
    Timeout { video_id: String, waited: Duration },
}

impl SessionError {
    /// Whether this is a local precondition failure; no request was sent.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Core(CoreError::Precondition(_)) | Self::Api(ApiError::Precondition(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_timeout() {
        let err = SessionError::Timeout {
            video_id: "abc123".into(),
            waited: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "Video abc123 still processing after 5s");
    }

    #[test]
    fn precondition_from_either_layer() {
        assert!(SessionError::from(CoreError::Precondition("x".into())).is_precondition());
        assert!(SessionError::from(ApiError::Precondition("x".into())).is_precondition());
        assert!(!SessionError::from(CoreError::NotFound(1)).is_precondition());
    }
}
