use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::identity::{COORDINATOR_ID, WorkerId};
use crate::state::StateSnapshot;

/// Reserved `destinationid` value meaning "all subscribers should process
/// this".
pub const BROADCAST: &str = "broadcast";

/// Message intent carried by an [`Envelope`].
///
/// Unrecognized wire values decode to [`Command::Unknown`] so that newer
/// fleet members can introduce commands without breaking older workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    // Outbound: worker → fleet.
    WorkerAvailable,
    WorkerStatus,
    WorkerStatusSimple,
    UnitStarted,
    UnitProgress,
    UnitFinished,
    // Inbound: orchestrator → worker.
    UnitDispatch,
    GetStatus,
    GetStatusSimple,
    ResetWorker,
    Shutdown,
    GlobalShutdown,
    #[serde(other)]
    Unknown,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::WorkerAvailable => "worker_available",
            Command::WorkerStatus => "worker_status",
            Command::WorkerStatusSimple => "worker_status_simple",
            Command::UnitStarted => "unit_started",
            Command::UnitProgress => "unit_progress",
            Command::UnitFinished => "unit_finished",
            Command::UnitDispatch => "unit_dispatch",
            Command::GetStatus => "get_status",
            Command::GetStatusSimple => "get_status_simple",
            Command::ResetWorker => "reset_worker",
            Command::Shutdown => "shutdown",
            Command::GlobalShutdown => "global_shutdown",
            Command::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Intended recipient of an envelope: a single worker or the whole fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Destination {
    Broadcast,
    Worker(WorkerId),
}

impl From<String> for Destination {
    fn from(s: String) -> Self {
        if s == BROADCAST {
            Destination::Broadcast
        } else {
            Destination::Worker(WorkerId::from(s))
        }
    }
}

impl From<Destination> for String {
    fn from(d: Destination) -> Self {
        match d {
            Destination::Broadcast => BROADCAST.to_string(),
            Destination::Worker(id) => id.as_str().to_string(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Broadcast => write!(f, "{}", BROADCAST),
            Destination::Worker(id) => write!(f, "{}", id),
        }
    }
}

/// The wire unit exchanged on both channels.
///
/// Every envelope carries all four fields; frames missing any of them are
/// rejected at decode time and dropped by the consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub command: Command,
    pub sourceid: String,
    pub destinationid: Destination,
    pub message: serde_json::Value,
}

impl Envelope {
    pub fn new(
        command: Command,
        sourceid: impl Into<String>,
        destinationid: Destination,
        message: serde_json::Value,
    ) -> Self {
        Self {
            command,
            sourceid: sourceid.into(),
            destinationid,
            message,
        }
    }

    /// Broadcast envelope stamped with a worker's own id.
    pub fn broadcast_from(command: Command, worker_id: &WorkerId, message: serde_json::Value) -> Self {
        Self::new(command, worker_id.as_str(), Destination::Broadcast, message)
    }

    /// True if this envelope should be processed by `worker_id`: either
    /// addressed to it directly or broadcast to the whole fleet.
    pub fn is_for(&self, worker_id: &WorkerId) -> bool {
        match &self.destinationid {
            Destination::Broadcast => true,
            Destination::Worker(id) => id == worker_id,
        }
    }

    /// True only for an exact point-to-point match.
    pub fn is_addressed_to(&self, worker_id: &WorkerId) -> bool {
        matches!(&self.destinationid, Destination::Worker(id) if id == worker_id)
    }

    /// Encode to a wire frame (JSON string).
    pub fn to_frame(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a wire frame. Fails on malformed JSON or missing fields.
    pub fn from_frame(frame: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(frame)?)
    }

    // ------------------------------------------------------------------
    // Orchestrator-side constructors. Commands built here are stamped with
    // the reserved coordinator id.
    // ------------------------------------------------------------------

    /// Dispatch a unit-of-work input to a specific worker.
    pub fn dispatch_to(worker: &WorkerId, input: serde_json::Value) -> Self {
        Self::new(
            Command::UnitDispatch,
            COORDINATOR_ID,
            Destination::Worker(worker.clone()),
            input,
        )
    }

    /// Request a full status report.
    pub fn status_request(destination: Destination) -> Self {
        Self::new(
            Command::GetStatus,
            COORDINATOR_ID,
            destination,
            serde_json::json!({}),
        )
    }

    /// Request an abbreviated status report.
    pub fn simple_status_request(destination: Destination) -> Self {
        Self::new(
            Command::GetStatusSimple,
            COORDINATOR_ID,
            destination,
            serde_json::json!({}),
        )
    }

    /// Reset a worker's unit-of-work progress.
    pub fn reset_of(worker: &WorkerId) -> Self {
        Self::new(
            Command::ResetWorker,
            COORDINATOR_ID,
            Destination::Worker(worker.clone()),
            serde_json::json!({}),
        )
    }

    /// Stop a single worker.
    pub fn shutdown_of(worker: &WorkerId) -> Self {
        Self::new(
            Command::Shutdown,
            COORDINATOR_ID,
            Destination::Worker(worker.clone()),
            serde_json::json!({}),
        )
    }

    /// Stop every worker on the channel.
    pub fn global_shutdown() -> Self {
        Self::new(
            Command::GlobalShutdown,
            COORDINATOR_ID,
            Destination::Broadcast,
            serde_json::json!({}),
        )
    }
}

// ---------------------------------------------------------------------------
// Outbound payload shapes
// ---------------------------------------------------------------------------

/// Payload of a `worker_available` announcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityPayload {
    /// When the worker last became idle (RFC 3339).
    pub available_since: DateTime<Utc>,
}

/// Payload of a `worker_status` report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub status: StateSnapshot,
    /// The current unit-of-work input, verbatim.
    pub unit_data: serde_json::Value,
    pub status_at: DateTime<Utc>,
}

/// Payload of a `worker_status_simple` report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleStatusPayload {
    pub busy: bool,
    pub item_count: u64,
    pub processed_count: u64,
    pub failed_count: u64,
    /// Human-readable target of the current unit, or the literal string
    /// `"null"` when no target is loaded.
    pub target_descriptor: String,
    pub status_at: DateTime<Utc>,
}
