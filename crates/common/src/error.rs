use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Auth timeout")]
    AuthTimeout,

    #[error("Auth failed")]
    AuthFailed,
}

impl Error {
    /// True for malformed input: bad JSON or a payload of the wrong shape.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Json(_) | Error::Decode(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
