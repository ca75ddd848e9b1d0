use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Transport(reqwest::Error),
    /// No valid session could be established. `source` is set when a
    /// failed refresh cycle is the cause.
    Authentication {
        context: String,
        source: Option<RefreshError>,
    },
    Config(String),
    Timeout(Duration),
}

/// Outcome of a failed refresh cycle, shared by every caller attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    MissingCredential,
    Rejected { status: StatusCode, body: String },
    Transport(String),
    Malformed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::Json(err) => write!(f, "json error: {}", err),
            Error::Transport(err) => write!(f, "transport error: {}", err),
            Error::Authentication {
                context,
                source: Some(err),
            } => write!(f, "authentication failed: {}: {}", context, err),
            Error::Authentication {
                context,
                source: None,
            } => write!(f, "authentication failed: {}", context),
            Error::Config(msg) => write!(f, "config error: {}", msg),
            Error::Timeout(after) => write!(f, "timed out after {}ms", after.as_millis()),
        }
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshError::MissingCredential => write!(f, "no refresh credential"),
            RefreshError::Rejected { status, body } => {
                write!(f, "refresh rejected: status={} body='{}'", status, body)
            }
            RefreshError::Transport(msg) => write!(f, "refresh transport error: {}", msg),
            RefreshError::Malformed(msg) => write!(f, "malformed refresh response: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Transport(err) => Some(err),
            Error::Authentication {
                source: Some(err), ..
            } => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for RefreshError {}

impl Error {
    /// The refresh failure behind an authentication error, if any.
    pub fn refresh_cause(&self) -> Option<&RefreshError> {
        match self {
            Error::Authentication { source, .. } => source.as_ref(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err)
    }
}

impl From<reqwest::Error> for RefreshError {
    fn from(err: reqwest::Error) -> Self {
        RefreshError::Transport(err.to_string())
    }
}
