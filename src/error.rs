use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by an [`ApiTransport`](crate::transport::ApiTransport).
///
/// Every transport call is one logical request: it either yields decoded data
/// or fails with exactly one of these kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("rate limited{}", reset_suffix(.reset))]
    RateLimited { reset: Option<DateTime<Utc>> },

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("request canceled")]
    Canceled,
}

fn reset_suffix(reset: &Option<DateTime<Utc>>) -> String {
    match reset {
        Some(reset) => format!(" until {}", reset.format("%Y-%m-%d %H:%M:%S UTC")),
        None => String::new(),
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum FindError {
    /// Fatal misconfiguration, reported before any network activity.
    #[error("{0}")]
    Config(String),

    #[error("invalid repository spec: {0} (expected owner, owner/repo or owner/repo@ref)")]
    InvalidSpec(String),

    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("repository is empty (no commits yet)")]
    EmptyRepository,

    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to search all {count} repositories")]
    AllFailed { count: usize },

    #[error("search canceled")]
    Canceled,
}

impl FindError {
    pub fn api(context: impl Into<String>, source: ApiError) -> Self {
        match source {
            ApiError::Canceled => FindError::Canceled,
            source => FindError::Api {
                context: context.into(),
                source,
            },
        }
    }

    /// Cancellation is a deliberate stop, not a failure of the unit of work.
    pub fn is_canceled(&self) -> bool {
        matches!(self, FindError::Canceled)
    }

    /// The transport error behind this failure, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            FindError::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FindError>;
