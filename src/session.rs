use std::fmt;
use std::sync::Arc;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::credentials::CredentialStore;
use crate::errors::RefreshError;

const SIGNAL_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    NoRefreshCredential,
    RefreshFailed,
    /// The single permitted retry was rejected with another 401.
    RetryRejected,
    LoggedOut,
}

impl SessionEndReason {
    pub fn for_refresh_failure(err: &RefreshError) -> Self {
        match err {
            RefreshError::MissingCredential => SessionEndReason::NoRefreshCredential,
            _ => SessionEndReason::RefreshFailed,
        }
    }
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEndReason::NoRefreshCredential => write!(f, "no_refresh_credential"),
            SessionEndReason::RefreshFailed => write!(f, "refresh_failed"),
            SessionEndReason::RetryRejected => write!(f, "retry_rejected"),
            SessionEndReason::LoggedOut => write!(f, "logged_out"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionEnded {
    pub reason: SessionEndReason,
    pub at: Timestamp,
}

/// Broadcasts the end of a session to any number of subscribers (a router
/// redirecting to login, a UI shell, tests).
#[derive(Clone)]
pub struct SessionSignal {
    store: Arc<dyn CredentialStore>,
    sender: broadcast::Sender<SessionEnded>,
}

impl SessionSignal {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let (sender, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self { store, sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEnded> {
        self.sender.subscribe()
    }

    /// Clears stored credentials, then broadcasts.
    pub fn notify(&self, reason: SessionEndReason) {
        self.store.clear();
        let event = SessionEnded {
            reason,
            at: Timestamp::now(),
        };
        match self.sender.send(event) {
            Ok(receivers) => warn!(reason = %reason, receivers, "session.ended"),
            Err(_) => warn!(reason = %reason, receivers = 0, "session.ended"),
        }
    }
}
