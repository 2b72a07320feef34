use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to resolve {host}: {source}")]
    ResolveError {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Resolution of {0} exceeded the maximum depth")]
    ResolveDepthExceeded(String),

    #[error("Unexpected content type {content_type:?} from {url}")]
    UnexpectedContentType {
        url: String,
        content_type: Option<String>,
    },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
