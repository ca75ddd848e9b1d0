use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::credentials::{CredentialPair, CredentialStore};
use crate::errors::RefreshError;
use crate::session::{SessionEndReason, SessionSignal};
use crate::telemetry::refresh::{RefreshRole, RefreshTelemetry};

use super::RefreshExecutor;

type RefreshResult = Result<CredentialPair, RefreshError>;
type PendingRefresh = Shared<BoxFuture<'static, RefreshResult>>;

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<(RefreshTelemetry, PendingRefresh)>,
}

/// Outcome of joining a refresh cycle, plus whether this caller led it.
#[derive(Debug, Clone)]
pub struct RefreshTicket {
    pub outcome: RefreshResult,
    pub role: RefreshRole,
}

enum Flight {
    /// The stored access credential already moved past the presented one.
    Current(CredentialPair),
    Missing,
    Join {
        role: RefreshRole,
        telemetry: RefreshTelemetry,
        pending: PendingRefresh,
    },
}

/// Ensures at most one refresh call is outstanding. Concurrent callers attach
/// to the pending refresh and observe the same outcome.
///
/// A failed cycle ends the session exactly once, from inside the shared
/// refresh itself, so it happens whichever caller ends up polling it.
pub struct SingleFlightCoordinator<E> {
    executor: Arc<E>,
    store: Arc<dyn CredentialStore>,
    signal: SessionSignal,
    slot: Arc<Mutex<Slot>>,
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<E: RefreshExecutor> SingleFlightCoordinator<E> {
    pub fn new(executor: E, store: Arc<dyn CredentialStore>, signal: SessionSignal) -> Self {
        Self {
            executor: Arc::new(executor),
            store,
            signal,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn in_flight(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }

    pub async fn refresh(&self) -> Result<CredentialPair, RefreshError> {
        self.join(None).await.outcome
    }

    /// Refresh on behalf of a request that was rejected while carrying
    /// `presented`. When the store already holds a different access
    /// credential, that one is returned without a network call.
    pub async fn refresh_after(&self, presented: Option<&str>) -> RefreshTicket {
        self.join(Some(presented)).await
    }

    async fn join(&self, presented: Option<Option<&str>>) -> RefreshTicket {
        match self.begin(presented) {
            Flight::Current(pair) => {
                debug!("refresh.skipped_already_rotated");
                RefreshTicket {
                    outcome: Ok(pair),
                    role: RefreshRole::Follower,
                }
            }
            Flight::Missing => {
                let err = RefreshError::MissingCredential;
                warn!(error = %err, "refresh.unavailable");
                self.signal.notify(SessionEndReason::for_refresh_failure(&err));
                RefreshTicket {
                    outcome: Err(err),
                    role: RefreshRole::Leader,
                }
            }
            Flight::Join {
                role,
                telemetry,
                pending,
            } => {
                telemetry.emit_attach(role);
                RefreshTicket {
                    outcome: pending.await,
                    role,
                }
            }
        }
    }

    /// Check-and-install under one non-async lock; nothing here awaits.
    fn begin(&self, presented: Option<Option<&str>>) -> Flight {
        let mut slot = lock(&self.slot);
        if let Some((telemetry, pending)) = &slot.pending {
            return Flight::Join {
                role: RefreshRole::Follower,
                telemetry: telemetry.clone(),
                pending: pending.clone(),
            };
        }

        let current = self.store.get();
        if let (Some(presented), Some(current)) = (presented, current.as_ref())
            && presented != Some(current.access.as_str())
        {
            return Flight::Current(current.clone());
        }
        let Some(refresh) = current.map(|pair| pair.refresh) else {
            return Flight::Missing;
        };

        slot.generation += 1;
        let generation = slot.generation;
        let telemetry = RefreshTelemetry::new(generation);
        let pending = Self::cycle(
            Arc::clone(&self.executor),
            Arc::clone(&self.store),
            self.signal.clone(),
            Arc::clone(&self.slot),
            refresh,
            telemetry.clone(),
        )
        .boxed()
        .shared();
        slot.pending = Some((telemetry.clone(), pending.clone()));
        Flight::Join {
            role: RefreshRole::Leader,
            telemetry,
            pending,
        }
    }

    fn cycle(
        executor: Arc<E>,
        store: Arc<dyn CredentialStore>,
        signal: SessionSignal,
        slot: Arc<Mutex<Slot>>,
        refresh: String,
        telemetry: RefreshTelemetry,
    ) -> impl Future<Output = RefreshResult> + Send + 'static {
        let generation = telemetry.generation();
        async move {
            telemetry.emit_start();
            let started = Instant::now();
            let outcome = executor.execute(store.as_ref(), &refresh).await;
            match &outcome {
                Ok(_) => telemetry.emit_success(started.elapsed()),
                Err(err) => telemetry.emit_failure(err, started.elapsed()),
            }
            // Settled: free the slot so the next 401 starts a fresh cycle.
            {
                let mut slot = lock(&slot);
                let ours = matches!(&slot.pending, Some((t, _)) if t.generation() == generation);
                if ours {
                    slot.pending = None;
                }
            }
            if let Err(err) = &outcome {
                signal.notify(SessionEndReason::for_refresh_failure(err));
            }
            outcome
        }
    }
}
