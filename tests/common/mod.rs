#![allow(dead_code)]

use std::sync::{Arc, Once};

use receipt_gateway::{CredentialPair, CredentialStore, GatewayConfig, MemoryCredentialStore};
use wiremock::MockServer;

pub const REFRESH_PATH: &str = "/api/auth/token/refresh/";

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

pub fn config(server: &MockServer) -> GatewayConfig {
    GatewayConfig::from_values(server.uri(), None, None, Some(5))
}

pub fn store(access: &str, refresh: &str) -> Arc<dyn CredentialStore> {
    Arc::new(MemoryCredentialStore::with_pair(CredentialPair::new(
        access, refresh,
    )))
}

pub fn empty_store() -> Arc<dyn CredentialStore> {
    Arc::new(MemoryCredentialStore::new())
}
