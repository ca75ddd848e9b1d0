use std::time::Duration;

use tracing::{Level, event};
use uuid::Uuid;

use crate::errors::RefreshError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshRole {
    /// Started the cycle and owns its side effects.
    Leader,
    /// Attached to a cycle already in flight.
    Follower,
}

/// Correlates the log events of one refresh cycle.
#[derive(Clone, Debug)]
pub struct RefreshTelemetry {
    attempt_id: Uuid,
    generation: u64,
}

impl RefreshTelemetry {
    pub fn new(generation: u64) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            generation,
        }
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn emit_start(&self) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            generation = self.generation,
            "refresh.start"
        );
    }

    pub fn emit_attach(&self, role: RefreshRole) {
        event!(
            Level::DEBUG,
            attempt_id = %self.attempt_id,
            generation = self.generation,
            role = ?role,
            "refresh.attach"
        );
    }

    pub fn emit_success(&self, elapsed: Duration) {
        event!(
            Level::INFO,
            attempt_id = %self.attempt_id,
            generation = self.generation,
            elapsed_ms = elapsed.as_millis() as u64,
            "refresh.success"
        );
    }

    pub fn emit_failure(&self, error: &RefreshError, elapsed: Duration) {
        event!(
            Level::ERROR,
            attempt_id = %self.attempt_id,
            generation = self.generation,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error,
            "refresh.failure"
        );
    }
}
