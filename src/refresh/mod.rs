mod coordinator;
mod executor;

pub use coordinator::{RefreshTicket, SingleFlightCoordinator};
pub use executor::{HttpRefreshExecutor, RefreshExecutor};
