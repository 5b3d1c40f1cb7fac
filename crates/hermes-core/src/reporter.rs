use crate::envelope::Command;
use crate::identity::WorkerId;

/// Events emitted by the coordination layer for monitoring/logging.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent<'a> {
    Started {
        worker_id: &'a WorkerId,
    },
    AvailabilityAnnounced {
        worker_id: &'a WorkerId,
    },
    CommandReceived {
        command: Command,
        sourceid: &'a str,
    },
    EnvelopeIgnored {
        command: Command,
        destinationid: &'a str,
    },
    FrameRejected {
        error: &'a str,
    },
    UnitAccepted {
        unit_id: &'a str,
    },
    DispatchDropped {
        current_unit_id: Option<&'a str>,
    },
    UnitFinished {
        unit_id: &'a str,
    },
    StatusPublished {
        simple: bool,
    },
    ShuttingDown {
        worker_id: &'a WorkerId,
    },
    Stopped {
        worker_id: &'a WorkerId,
    },
}

/// Trait for receiving coordinator events (decoupled logging).
pub trait EventReporter: Send + Sync {
    fn report(&self, event: CoordinatorEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl EventReporter for TracingReporter {
    fn report(&self, event: CoordinatorEvent<'_>) {
        match event {
            CoordinatorEvent::Started { worker_id } => {
                tracing::info!(%worker_id, "Worker coordinator started");
            }
            CoordinatorEvent::AvailabilityAnnounced { worker_id } => {
                tracing::debug!(%worker_id, "Announced availability");
            }
            CoordinatorEvent::CommandReceived { command, sourceid } => {
                tracing::debug!(%command, %sourceid, "Command received");
            }
            CoordinatorEvent::EnvelopeIgnored {
                command,
                destinationid,
            } => {
                tracing::trace!(%command, %destinationid, "Envelope addressed elsewhere");
            }
            CoordinatorEvent::FrameRejected { error } => {
                tracing::warn!(%error, "Dropping malformed frame");
            }
            CoordinatorEvent::UnitAccepted { unit_id } => {
                tracing::info!(%unit_id, "Unit dispatched");
            }
            CoordinatorEvent::DispatchDropped { current_unit_id } => {
                tracing::warn!(?current_unit_id, "Dispatch dropped, worker busy");
            }
            CoordinatorEvent::UnitFinished { unit_id } => {
                tracing::info!(%unit_id, "Unit finished");
            }
            CoordinatorEvent::StatusPublished { simple } => {
                tracing::debug!(%simple, "Status published");
            }
            CoordinatorEvent::ShuttingDown { worker_id } => {
                tracing::info!(%worker_id, "Worker shutting down");
            }
            CoordinatorEvent::Stopped { worker_id } => {
                tracing::info!(%worker_id, "Worker stopped");
            }
        }
    }
}
