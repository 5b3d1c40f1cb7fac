use std::future::Future;

use crate::error::AppError;
use crate::lifecycle::UnitLifecycle;

/// Consuming side of the shared request channel.
///
/// Implementations wrap one subscription to a fanout exchange. `recv` yields
/// raw wire frames; decoding happens at the dispatcher boundary so a
/// malformed frame never takes the transport down.
pub trait RequestChannel: Send + 'static {
    /// Wait for the next frame. `Ok(None)` means the channel is closed.
    fn recv(&mut self) -> impl Future<Output = Result<Option<String>, AppError>> + Send;
}

/// Publishing side of the shared response channel.
pub trait ResponseChannel: Send + Sync + Clone + 'static {
    /// Publish one frame to every current subscriber.
    fn publish(&self, frame: String) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Progress counters reported by a unit-of-work.
#[derive(Debug, Clone, Default)]
pub struct UnitSnapshot {
    pub item_count: u64,
    pub processed_count: u64,
    pub failed_count: u64,
    /// Human-readable description of what the unit is working on.
    pub target: Option<String>,
    /// The input payload the unit was loaded with, verbatim.
    pub input: serde_json::Value,
}

/// The externally-supplied scraping job abstraction.
///
/// Opaque to the coordination layer beyond its lifecycle: the dispatcher
/// loads an input into it, begins execution, and may reset or halt it; the
/// unit reports started/progress/finished through the [`UnitLifecycle`]
/// bridge it receives at `begin`.
pub trait WorkUnit: Send + Sync + Clone + 'static {
    /// The unit's own id, used as `sourceid` on its finished announcement.
    fn unit_id(&self) -> String;

    /// Load a dispatched input payload. Fails closed on malformed payloads.
    fn load(&self, input: serde_json::Value) -> Result<(), AppError>;

    /// Begin execution if not already started. Expected to return promptly,
    /// running the actual work on its own task.
    fn begin<R: ResponseChannel>(
        &self,
        lifecycle: UnitLifecycle<R>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Reset internal progress counters.
    fn reset(&self);

    /// Stop execution. Idempotent.
    fn halt(&self);

    fn snapshot(&self) -> UnitSnapshot;
}

/// A no-op WorkUnit for wiring a worker that only answers status commands.
#[derive(Debug, Clone)]
pub struct NullUnit {
    id: String,
}

impl NullUnit {
    pub fn new() -> Self {
        Self {
            id: format!("null-{}", uuid::Uuid::new_v4()),
        }
    }
}

impl Default for NullUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkUnit for NullUnit {
    fn unit_id(&self) -> String {
        self.id.clone()
    }

    fn load(&self, _input: serde_json::Value) -> Result<(), AppError> {
        Ok(())
    }

    async fn begin<R: ResponseChannel>(&self, _lifecycle: UnitLifecycle<R>) -> Result<(), AppError> {
        Ok(())
    }

    fn reset(&self) {}

    fn halt(&self) {}

    fn snapshot(&self) -> UnitSnapshot {
        UnitSnapshot::default()
    }
}
