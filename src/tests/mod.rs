pub(crate) mod gateway_passthrough;
pub(crate) mod single_flight;
