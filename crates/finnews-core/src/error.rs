use thiserror::Error;

/// Failure to turn raw model output into a [`crate::SignalAnalysis`].
#[derive(Error, Debug)]
pub enum SignalParseError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("model output is not a JSON object")]
    NotAnObject,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

pub type ParseResult<T> = Result<T, SignalParseError>;
