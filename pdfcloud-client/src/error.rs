use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to the document service
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error (status {status}): {message}")]
    HttpStatus { status: u16, message: String },

    #[error("{message}")]
    RemoteTask { code: i64, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("IO error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Task did not complete after {attempts} polls ({elapsed:?})")]
    PollLimitExceeded { attempts: u32, elapsed: Duration },
}

impl ClientError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClientError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        ClientError::Config {
            message: message.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ClientError::MalformedResponse {
            message: message.into(),
        }
    }

    /// Short machine-readable name for the error category
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Transport(_) => "transport_error",
            ClientError::HttpStatus { .. } => "http_status_error",
            ClientError::RemoteTask { .. } => "remote_task_error",
            ClientError::Config { .. } => "config_error",
            ClientError::MalformedResponse { .. } => "malformed_response",
            ClientError::Io { .. } => "io_error",
            ClientError::PollLimitExceeded { .. } => "poll_limit_exceeded",
        }
    }
}

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;
