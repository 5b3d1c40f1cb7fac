use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::envelope::{Command, Envelope, SimpleStatusPayload, StatusPayload};
use crate::error::AppError;
use crate::identity::WorkerId;
use crate::lifecycle::UnitLifecycle;
use crate::reporter::{CoordinatorEvent, EventReporter};
use crate::state::SharedState;
use crate::traits::{ResponseChannel, WorkUnit};

/// Routes inbound envelopes to the worker's local actions.
///
/// All handling happens on the coordinator's single consume task, so the
/// busy-check-then-claim in the dispatch path is atomic with respect to every
/// other inbound command.
pub struct CommandDispatcher<R, U>
where
    R: ResponseChannel,
    U: WorkUnit,
{
    worker_id: WorkerId,
    state: SharedState,
    unit: U,
    response: R,
    cancel_token: CancellationToken,
}

impl<R, U> CommandDispatcher<R, U>
where
    R: ResponseChannel,
    U: WorkUnit,
{
    pub fn new(
        worker_id: WorkerId,
        state: SharedState,
        unit: U,
        response: R,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            worker_id,
            state,
            unit,
            response,
            cancel_token,
        }
    }

    /// Decode and process one wire frame.
    ///
    /// Malformed frames and payloads are logged and dropped; the returned
    /// error is reserved for outbound publish failures on the status-reply
    /// path, which the consume loop surfaces without stopping.
    pub async fn handle_frame<RP: EventReporter>(
        &self,
        frame: &str,
        reporter: &RP,
    ) -> Result<(), AppError> {
        let envelope = match Envelope::from_frame(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                reporter.report(CoordinatorEvent::FrameRejected {
                    error: &e.to_string(),
                });
                return Ok(());
            }
        };

        if !envelope.is_for(&self.worker_id) {
            reporter.report(CoordinatorEvent::EnvelopeIgnored {
                command: envelope.command,
                destinationid: &envelope.destinationid.to_string(),
            });
            return Ok(());
        }

        reporter.report(CoordinatorEvent::CommandReceived {
            command: envelope.command,
            sourceid: &envelope.sourceid,
        });

        match envelope.command {
            Command::UnitDispatch => {
                self.on_dispatch(envelope, reporter).await;
                Ok(())
            }
            Command::UnitFinished => {
                self.on_unit_finished(&envelope, reporter);
                Ok(())
            }
            Command::GetStatus => {
                self.publish_status().await?;
                reporter.report(CoordinatorEvent::StatusPublished { simple: false });
                Ok(())
            }
            Command::GetStatusSimple => {
                self.publish_simple_status().await?;
                reporter.report(CoordinatorEvent::StatusPublished { simple: true });
                Ok(())
            }
            Command::ResetWorker => {
                // Progress only; the busy flag is left as-is.
                self.unit.reset();
                Ok(())
            }
            Command::Shutdown => {
                // Point-to-point variant; a broadcast `shutdown` is not ours.
                if envelope.is_addressed_to(&self.worker_id) {
                    self.stop(reporter);
                }
                Ok(())
            }
            Command::GlobalShutdown => {
                self.stop(reporter);
                Ok(())
            }
            // Other workers' broadcasts on a shared exchange, and commands
            // from newer fleet members.
            _ => Ok(()),
        }
    }

    /// Stop consuming, stop the broadcaster, halt the unit. Idempotent.
    pub fn stop<RP: EventReporter>(&self, reporter: &RP) {
        reporter.report(CoordinatorEvent::ShuttingDown {
            worker_id: &self.worker_id,
        });
        self.unit.halt();
        self.cancel_token.cancel();
    }

    async fn on_dispatch<RP: EventReporter>(&self, envelope: Envelope, reporter: &RP) {
        // Dispatch is point-to-point: a broadcast dispatch would start the
        // same unit on every idle worker.
        if !envelope.is_addressed_to(&self.worker_id) {
            return;
        }

        if self.state.busy() {
            let current = self.state.current_unit_id();
            reporter.report(CoordinatorEvent::DispatchDropped {
                current_unit_id: current.as_deref(),
            });
            return;
        }

        if let Err(e) = self.unit.load(envelope.message) {
            tracing::warn!(error = %e, "Rejected dispatch payload");
            return;
        }

        let unit_id = self.unit.unit_id();
        self.state.begin_unit(&unit_id);

        let lifecycle = UnitLifecycle::new(
            self.worker_id.clone(),
            unit_id.clone(),
            self.state.clone(),
            self.response.clone(),
        );
        if let Err(e) = self.unit.begin(lifecycle).await {
            tracing::warn!(error = %e, %unit_id, "Unit failed to start");
            self.state.finish_unit();
            return;
        }

        reporter.report(CoordinatorEvent::UnitAccepted { unit_id: &unit_id });
    }

    fn on_unit_finished<RP: EventReporter>(&self, envelope: &Envelope, reporter: &RP) {
        // Only the announcement of our own in-flight unit releases the slot.
        if self.state.current_unit_id().as_deref() == Some(envelope.sourceid.as_str()) {
            self.state.finish_unit();
            reporter.report(CoordinatorEvent::UnitFinished {
                unit_id: &envelope.sourceid,
            });
        }
    }

    async fn publish_status(&self) -> Result<(), AppError> {
        let payload = StatusPayload {
            status: self.state.snapshot(),
            unit_data: self.unit.snapshot().input,
            status_at: Utc::now(),
        };
        self.publish_broadcast(Command::WorkerStatus, serde_json::to_value(payload)?)
            .await
    }

    async fn publish_simple_status(&self) -> Result<(), AppError> {
        let snapshot = self.unit.snapshot();
        let payload = SimpleStatusPayload {
            busy: self.state.busy(),
            item_count: snapshot.item_count,
            processed_count: snapshot.processed_count,
            failed_count: snapshot.failed_count,
            target_descriptor: snapshot.target.unwrap_or_else(|| "null".to_string()),
            status_at: Utc::now(),
        };
        self.publish_broadcast(Command::WorkerStatusSimple, serde_json::to_value(payload)?)
            .await
    }

    async fn publish_broadcast(
        &self,
        command: Command,
        payload: serde_json::Value,
    ) -> Result<(), AppError> {
        let envelope = Envelope::broadcast_from(command, &self.worker_id, payload);
        self.response.publish(envelope.to_frame()?).await
    }
}
