use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("History I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("History is not a valid record array: {0}")]
    Format(#[from] serde_json::Error),
}

pub type CalibrationResult<T> = Result<T, CalibrationError>;
