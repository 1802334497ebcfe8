use shared::error::ErrorCode;
use thiserror::Error;

/// Local precondition failure. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("user name cannot be empty")]
    EmptyName,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to collection failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("collection returned status {status} ({code:?})")]
    Status {
        status: u16,
        code: ErrorCode,
        message: Option<String>,
    },
    #[error("invalid collection url: {0}")]
    Url(#[from] url::ParseError),
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    pub fn status(status: u16, message: Option<String>) -> Self {
        Self::Status {
            status,
            code: ErrorCode::from_status(status),
            message,
        }
    }

    /// Message the server attached to a non-success response, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// Failure of a list query. Kept on the cache as a persistent status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to list users: {reason}")]
pub struct ListError {
    pub reason: String,
}

impl From<&FetchError> for ListError {
    fn from(value: &FetchError) -> Self {
        Self {
            reason: value.to_string(),
        }
    }
}

/// Terminal failure of a single intent. Already reported on the notification
/// channel by the time a caller sees it.
#[derive(Debug, Error)]
pub enum IntentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    List(#[from] ListError),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid collection url '{value}': {source}")]
    CollectionUrl {
        value: String,
        source: url::ParseError,
    },
}
