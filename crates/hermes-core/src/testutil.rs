//! Test utilities: mock implementations of the channel and unit traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` for interior mutability, allowing test assertions on
//! recorded calls.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::error::AppError;
use crate::lifecycle::UnitLifecycle;
use crate::reporter::{CoordinatorEvent, EventReporter};
use crate::traits::{RequestChannel, ResponseChannel, UnitSnapshot, WorkUnit};

// ---------------------------------------------------------------------------
// MockResponseChannel
// ---------------------------------------------------------------------------

/// Response channel that records every published frame.
#[derive(Clone, Default)]
pub struct MockResponseChannel {
    frames: Arc<Mutex<Vec<String>>>,
    publish_error: Arc<Mutex<Option<AppError>>>,
}

impl MockResponseChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel whose next publish fails with the given error.
    pub fn with_publish_error(error: AppError) -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            publish_error: Arc::new(Mutex::new(Some(error))),
        }
    }

    /// Raw frames, in publish order.
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    /// Published frames decoded back into envelopes.
    pub fn envelopes(&self) -> Vec<Envelope> {
        self.frames()
            .iter()
            .map(|f| Envelope::from_frame(f).expect("mock channel received a malformed frame"))
            .collect()
    }

    pub fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }
}

impl ResponseChannel for MockResponseChannel {
    async fn publish(&self, frame: String) -> Result<(), AppError> {
        let mut err = self.publish_error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedRequestChannel
// ---------------------------------------------------------------------------

/// Test handle for feeding frames into a [`ScriptedRequestChannel`].
///
/// Dropping the sender closes the channel, which a consume loop observes as
/// `Ok(None)`.
pub struct ScriptedRequestSender {
    tx: mpsc::UnboundedSender<String>,
}

impl ScriptedRequestSender {
    pub fn send(&self, envelope: &Envelope) {
        self.send_raw(envelope.to_frame().expect("test envelope serializes"));
    }

    pub fn send_raw(&self, frame: String) {
        let _ = self.tx.send(frame);
    }
}

/// Request channel fed by a [`ScriptedRequestSender`].
pub struct ScriptedRequestChannel {
    rx: mpsc::UnboundedReceiver<String>,
}

/// Create a scripted request channel pair.
pub fn request_channel() -> (ScriptedRequestSender, ScriptedRequestChannel) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ScriptedRequestSender { tx },
        ScriptedRequestChannel { rx },
    )
}

impl RequestChannel for ScriptedRequestChannel {
    async fn recv(&mut self) -> Result<Option<String>, AppError> {
        Ok(self.rx.recv().await)
    }
}

// ---------------------------------------------------------------------------
// MockUnit
// ---------------------------------------------------------------------------

/// Mock unit-of-work that records calls.
///
/// With [`finishing`](MockUnit::finishing), `begin` immediately announces
/// started and finished through the lifecycle bridge, simulating a unit that
/// completes instantly.
#[derive(Clone)]
pub struct MockUnit {
    id: String,
    loads: Arc<Mutex<Vec<serde_json::Value>>>,
    begins: Arc<Mutex<u32>>,
    resets: Arc<Mutex<u32>>,
    halts: Arc<Mutex<u32>>,
    load_error: Arc<Mutex<Option<AppError>>>,
    begin_error: Arc<Mutex<Option<AppError>>>,
    finish_on_begin: bool,
    snapshot: Arc<Mutex<UnitSnapshot>>,
}

impl MockUnit {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            loads: Arc::new(Mutex::new(Vec::new())),
            begins: Arc::new(Mutex::new(0)),
            resets: Arc::new(Mutex::new(0)),
            halts: Arc::new(Mutex::new(0)),
            load_error: Arc::new(Mutex::new(None)),
            begin_error: Arc::new(Mutex::new(None)),
            finish_on_begin: false,
            snapshot: Arc::new(Mutex::new(UnitSnapshot::default())),
        }
    }

    /// Unit that completes the moment it is begun.
    pub fn finishing(mut self) -> Self {
        self.finish_on_begin = true;
        self
    }

    pub fn with_load_error(self, error: AppError) -> Self {
        *self.load_error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_begin_error(self, error: AppError) -> Self {
        *self.begin_error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_snapshot(self, snapshot: UnitSnapshot) -> Self {
        *self.snapshot.lock().unwrap() = snapshot;
        self
    }

    pub fn loads(&self) -> Vec<serde_json::Value> {
        self.loads.lock().unwrap().clone()
    }

    pub fn begin_count(&self) -> u32 {
        *self.begins.lock().unwrap()
    }

    pub fn reset_count(&self) -> u32 {
        *self.resets.lock().unwrap()
    }

    pub fn halt_count(&self) -> u32 {
        *self.halts.lock().unwrap()
    }
}

impl WorkUnit for MockUnit {
    fn unit_id(&self) -> String {
        self.id.clone()
    }

    fn load(&self, input: serde_json::Value) -> Result<(), AppError> {
        let mut err = self.load_error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        let mut snapshot = self.snapshot.lock().unwrap();
        snapshot.input = input.clone();
        drop(snapshot);
        self.loads.lock().unwrap().push(input);
        Ok(())
    }

    async fn begin<R: ResponseChannel>(&self, lifecycle: UnitLifecycle<R>) -> Result<(), AppError> {
        {
            let mut err = self.begin_error.lock().unwrap();
            if let Some(e) = err.take() {
                return Err(e);
            }
        }
        *self.begins.lock().unwrap() += 1;

        if self.finish_on_begin {
            lifecycle
                .unit_started(serde_json::json!({"unit": self.id}))
                .await?;
            lifecycle
                .unit_finished(serde_json::json!({"unit": self.id}))
                .await?;
        }
        Ok(())
    }

    fn reset(&self) {
        *self.resets.lock().unwrap() += 1;
        let mut snapshot = self.snapshot.lock().unwrap();
        snapshot.processed_count = 0;
        snapshot.failed_count = 0;
    }

    fn halt(&self) {
        *self.halts.lock().unwrap() += 1;
    }

    fn snapshot(&self) -> UnitSnapshot {
        self.snapshot.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock reporter that records event labels.
#[derive(Clone, Default)]
pub struct MockReporter {
    labels: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }
}

impl EventReporter for MockReporter {
    fn report(&self, event: CoordinatorEvent<'_>) {
        let label = match &event {
            CoordinatorEvent::Started { .. } => "Started",
            CoordinatorEvent::AvailabilityAnnounced { .. } => "AvailabilityAnnounced",
            CoordinatorEvent::CommandReceived { .. } => "CommandReceived",
            CoordinatorEvent::EnvelopeIgnored { .. } => "EnvelopeIgnored",
            CoordinatorEvent::FrameRejected { .. } => "FrameRejected",
            CoordinatorEvent::UnitAccepted { .. } => "UnitAccepted",
            CoordinatorEvent::DispatchDropped { .. } => "DispatchDropped",
            CoordinatorEvent::UnitFinished { .. } => "UnitFinished",
            CoordinatorEvent::StatusPublished { .. } => "StatusPublished",
            CoordinatorEvent::ShuttingDown { .. } => "ShuttingDown",
            CoordinatorEvent::Stopped { .. } => "Stopped",
        };
        self.labels.lock().unwrap().push(label.to_string());
    }
}
