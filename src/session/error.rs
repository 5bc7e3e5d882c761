use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session limit exceeded ({max})")]
    LimitExceeded { max: usize },
    #[error("session already exists: {stream_id}")]
    AlreadyExists { stream_id: String },
    #[error("session not found: {stream_id}")]
    NotFound { stream_id: String },
}

impl SessionError {
    pub fn not_found(stream_id: impl Into<String>) -> Self {
        Self::NotFound {
            stream_id: stream_id.into(),
        }
    }
}
