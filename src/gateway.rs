use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::credentials::{CredentialPair, CredentialStore};
use crate::errors::Error;
use crate::public::PublicEndpoints;
use crate::refresh::{HttpRefreshExecutor, RefreshExecutor, SingleFlightCoordinator};
use crate::session::{SessionEndReason, SessionEnded, SessionSignal};
use crate::transport::{HttpTransport, OutgoingRequest, Transport, TransportResponse};

/// Which dispatch of a request this is. A request gets one `Initial`
/// dispatch and at most one `Retry`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    Retry,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::Initial => write!(f, "initial"),
            Attempt::Retry => write!(f, "retry"),
        }
    }
}

/// Attaches the access credential to outgoing requests and recovers from a
/// 401 by refreshing once and retrying once.
pub struct RequestGateway<T, E> {
    transport: T,
    store: Arc<dyn CredentialStore>,
    coordinator: SingleFlightCoordinator<E>,
    public: PublicEndpoints,
    signal: SessionSignal,
}

impl RequestGateway<HttpTransport, HttpRefreshExecutor> {
    pub fn from_config(config: &GatewayConfig, store: Arc<dyn CredentialStore>) -> Result<Self, Error> {
        config.validate()?;
        let transport = HttpTransport::from_config(config)?;
        let executor = HttpRefreshExecutor::from_config(config)?;
        let public = PublicEndpoints::new(config.public_endpoint_list());
        let signal = SessionSignal::new(Arc::clone(&store));
        info!(
            base_url = %transport.base(),
            refresh_url = %executor.url(),
            public_endpoints = public.entries().len(),
            "gateway.configured"
        );
        Ok(Self::new(transport, executor, store, public, signal))
    }
}

impl<T: Transport, E: RefreshExecutor> RequestGateway<T, E> {
    pub fn new(
        transport: T,
        executor: E,
        store: Arc<dyn CredentialStore>,
        public: PublicEndpoints,
        signal: SessionSignal,
    ) -> Self {
        Self {
            transport,
            coordinator: SingleFlightCoordinator::new(
                executor,
                Arc::clone(&store),
                signal.clone(),
            ),
            store,
            public,
            signal,
        }
    }

    pub fn coordinator(&self) -> &SingleFlightCoordinator<E> {
        &self.coordinator
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEnded> {
        self.signal.subscribe()
    }

    /// Stores a pair issued by a successful login.
    pub fn sign_in(&self, pair: CredentialPair) {
        self.store.set(pair);
        info!("session.started");
    }

    pub fn logout(&self) {
        self.signal.notify(SessionEndReason::LoggedOut);
    }

    /// Sends `request`, attaching the access credential unless the target is
    /// public. Every response other than 401 is returned unchanged.
    pub async fn send(&self, request: OutgoingRequest) -> Result<TransportResponse, Error> {
        if self.public.matches(&request.target) {
            debug!(method = %request.method, target = %request.path(), "gateway.public");
            return self.transport.dispatch(&request, None).await;
        }

        let presented = self.store.access();
        let resp = self
            .attempt(&request, presented.as_deref(), Attempt::Initial)
            .await?;
        if !resp.is_unauthorized() {
            return Ok(resp);
        }

        let pair = self.recover(&request, presented.as_deref()).await?;
        let resp = self
            .attempt(&request, Some(&pair.access), Attempt::Retry)
            .await?;
        if !resp.is_unauthorized() {
            return Ok(resp);
        }

        self.signal.notify(SessionEndReason::RetryRejected);
        Err(Error::Authentication {
            context: format!("401 on retry of {} {}", request.method, request.path()),
            source: None,
        })
    }

    async fn attempt(
        &self,
        request: &OutgoingRequest,
        bearer: Option<&str>,
        attempt: Attempt,
    ) -> Result<TransportResponse, Error> {
        debug!(
            method = %request.method,
            target = %request.path(),
            attempt = %attempt,
            credential = bearer.is_some(),
            "gateway.dispatch"
        );
        let resp = self.transport.dispatch(request, bearer).await?;
        if resp.is_unauthorized() {
            warn!(
                method = %request.method,
                target = %request.path(),
                attempt = %attempt,
                status = resp.status.as_u16(),
                "gateway.unauthorized"
            );
        }
        Ok(resp)
    }

    /// Obtains a usable pair after a 401. A failed cycle has already ended
    /// the session inside the coordinator by the time this returns.
    async fn recover(
        &self,
        request: &OutgoingRequest,
        presented: Option<&str>,
    ) -> Result<CredentialPair, Error> {
        let ticket = self.coordinator.refresh_after(presented).await;
        ticket.outcome.map_err(|err| Error::Authentication {
            context: format!(
                "session could not be refreshed for {} {}",
                request.method,
                request.path()
            ),
            source: Some(err),
        })
    }
}
