use reqwest::StatusCode;
use thiserror::Error;

/// The one way normalization can fail: the input does not have the shape of
/// a WeatherLink data response.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },
}

impl NormalizeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse { reason: reason.into() }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to WeatherLink failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("WeatherLink request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode WeatherLink response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid historic range {start}..{end}: {reason}")]
    InvalidRange { start: i64, end: i64, reason: &'static str },

    #[error("sensor {0} not found")]
    NotFound(i64),
}
