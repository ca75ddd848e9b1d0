use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::Error;

/// Access/refresh pair issued on login or refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_len", &self.access.len())
            .field("refresh_len", &self.refresh.len())
            .finish()
    }
}

/// Durable holder of the current credential pair. Called synchronously from
/// the request hot path, so implementations must not block on I/O for long.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<CredentialPair>;
    fn set(&self, pair: CredentialPair);
    fn clear(&self);

    fn access(&self) -> Option<String> {
        self.get().map(|pair| pair.access)
    }

    fn refresh(&self) -> Option<String> {
        self.get().map(|pair| pair.refresh)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    pair: Mutex<Option<CredentialPair>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: Mutex::new(Some(pair)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<CredentialPair> {
        lock(&self.pair).clone()
    }

    fn set(&self, pair: CredentialPair) {
        *lock(&self.pair) = Some(pair);
    }

    fn clear(&self) {
        *lock(&self.pair) = None;
    }
}

/// JSON file backed store. The in-memory copy is authoritative; write
/// failures are logged and do not fail the caller.
pub struct FileCredentialStore {
    path: PathBuf,
    cached: Mutex<Option<CredentialPair>>,
}

impl FileCredentialStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let cached = match std::fs::read_to_string(&path) {
            Ok(contents) => Some(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            cached: Mutex::new(cached),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, pair: &CredentialPair) -> Result<(), Error> {
        let contents = serde_json::to_string(pair)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<CredentialPair> {
        lock(&self.cached).clone()
    }

    fn set(&self, pair: CredentialPair) {
        let mut cached = lock(&self.cached);
        if let Err(err) = self.persist(&pair) {
            warn!(path = %self.path.display(), error = %err, "credentials.persist_failed");
        }
        *cached = Some(pair);
    }

    fn clear(&self) {
        let mut cached = lock(&self.cached);
        *cached = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "credentials.remove_failed");
            }
        }
    }
}
