use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Credential error: {0}")]
    Credential(String),
    #[error("config was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { expected: u64, actual: u64 },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Failure of a single outbound API call, or of a bounded series of them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("youtube api error: http {status}; body={body}")]
    Status { status: u16, body: String },
    #[error("invalid api payload: {0}")]
    Decode(String),
    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u8, last: Box<FetchError> },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no youtube api key configured")]
    NoCredential,
    #[error("credential lookup failed: {0}")]
    Credential(String),
    #[error("invalid playlist id: {0:?}")]
    InvalidPlaylistId(String),
    #[error("playlist not found: {0}")]
    NotFound(String),
    #[error("playlist fetch failed: {0}")]
    FetchFailed(#[from] FetchError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("failed to open video: {0}")]
    Display(String),
    #[error("failed to show notification: {0}")]
    Notification(String),
}
