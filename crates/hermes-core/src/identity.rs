use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved sender id for commands that originate from the central
/// orchestrator rather than from a worker.
pub const COORDINATOR_ID: &str = "coordinator";

/// Process-unique worker identifier.
///
/// Generated once at worker startup and immutable for the process lifetime.
/// Doubles as the addressing key for point-to-point commands and as the
/// `sourceid` stamped on every outbound envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Generate a fresh collision-resistant id (UUID v4).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
