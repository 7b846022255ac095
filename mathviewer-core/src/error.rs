//! Error types shared by every component of the library.

use mathviewer_types::Status;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A backend answered with a non-"ok" status where success was required.
    #[error("Service `{service}` returned status `{status}`")]
    Status { service: String, status: Status },

    /// The backend rejected the MathML while generating an image.
    #[error("Malformed MathML: {0}")]
    MalformedMathml(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid service response: {0}")]
    InvalidResponse(String),

    /// A tree operation was given a node in the wrong position.
    #[error("DOM error: {0}")]
    Dom(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for the recoverable "backend said no" family of errors.
    pub fn is_status(&self) -> bool {
        matches!(self, Error::Status { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidResponse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
