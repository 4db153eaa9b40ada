use thiserror::Error;

use crate::resource::AccessUrl;

/// Message shown to the user whenever every download stage has been exhausted.
pub const DOWNLOAD_FAILED_MESSAGE: &str = "Failed to download podcast. Please try again.";

#[derive(Error, Debug)]
pub enum PodcastError {
    /// Backend or network failure during synthesis, surfaced verbatim.
    #[error("{0}")]
    GenerationFailed(String),

    #[error("Failed to download podcast. Please try again.")]
    DownloadFailed { cause: String },

    #[error("Resource invariant violated: {attempted} allocated while {live} is still live")]
    ResourceInvariantViolation { live: AccessUrl, attempted: String },

    #[error("No podcast audio is available")]
    NoResource,

    #[error("{message}")]
    Api { status: Option<u16>, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Media element error: {0}")]
    Media(String),
}

impl PodcastError {
    pub fn download_failed(cause: impl ToString) -> Self {
        PodcastError::DownloadFailed {
            cause: cause.to_string(),
        }
    }

    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        PodcastError::Api {
            status,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PodcastError>;
