//! Authenticated request gateway for the receipts API.
//!
//! [`RequestGateway`] attaches the stored access credential to every private
//! request and recovers from an expired credential by refreshing it once,
//! shared across all concurrent requests, then retrying once. When no session
//! can be restored the credentials are cleared and subscribers are told the
//! session ended.

pub mod config;
pub mod credentials;
pub mod errors;
pub mod gateway;
pub mod public;
pub mod refresh;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use config::GatewayConfig;
pub use credentials::{CredentialPair, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use errors::{Error, RefreshError};
pub use gateway::{Attempt, RequestGateway};
pub use public::PublicEndpoints;
pub use refresh::{HttpRefreshExecutor, RefreshExecutor, RefreshTicket, SingleFlightCoordinator};
pub use session::{SessionEndReason, SessionEnded, SessionSignal};
pub use telemetry::refresh::RefreshRole;
pub use transport::{HttpTransport, OutgoingRequest, Transport, TransportResponse};

#[cfg(test)]
mod tests;
