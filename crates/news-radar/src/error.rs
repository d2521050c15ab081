use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Ingestor closed")]
    Closed,
}

impl IngestError {
    /// Timeouts, dropped connections, 5xx and 429 are worth retrying; the rest are not.
    pub fn is_transient(&self) -> bool {
        match self {
            IngestError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            IngestError::Status(code) => *code >= 500 || *code == 429,
            IngestError::Malformed(_) | IngestError::Closed => false,
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
