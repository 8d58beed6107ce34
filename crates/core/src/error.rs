use crate::types::RecordId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Client-side state does not allow the requested operation yet
    /// (e.g. toggling boxes before the server issued a session id).
    #[error("Precondition failed: {0}")]
    Precondition(String),
}
