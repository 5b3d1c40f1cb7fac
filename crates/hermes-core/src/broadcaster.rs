use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::envelope::{AvailabilityPayload, Command, Envelope};
use crate::error::AppError;
use crate::identity::WorkerId;
use crate::reporter::{CoordinatorEvent, EventReporter};
use crate::state::SharedState;
use crate::traits::ResponseChannel;

/// Periodically announces worker availability on the response channel.
///
/// Skips the announcement silently while the worker is busy, so an occupied
/// worker never invites a second dispatch. The first tick fires immediately,
/// which is how a fresh worker registers itself with the fleet.
pub struct AvailabilityBroadcaster<R: ResponseChannel> {
    worker_id: WorkerId,
    state: SharedState,
    response: R,
    interval: Duration,
}

impl<R: ResponseChannel> AvailabilityBroadcaster<R> {
    pub fn new(worker_id: WorkerId, state: SharedState, response: R, interval: Duration) -> Self {
        Self {
            worker_id,
            state,
            response,
            interval,
        }
    }

    /// Run the announcement loop until cancellation.
    ///
    /// Once the token is cancelled no further announcement is published: a
    /// pending tick loses the race to the cancellation branch.
    pub async fn run<RP: EventReporter>(
        self,
        cancel_token: CancellationToken,
        reporter: Arc<RP>,
    ) -> Result<(), AppError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => break,
                _ = ticker.tick() => {
                    if self.state.busy() {
                        continue;
                    }
                    if let Err(e) = self.announce().await {
                        tracing::error!(error = %e, "Failed to announce availability");
                    } else {
                        reporter.report(CoordinatorEvent::AvailabilityAnnounced {
                            worker_id: &self.worker_id,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    async fn announce(&self) -> Result<(), AppError> {
        let payload = AvailabilityPayload {
            available_since: self.state.idle_since(),
        };
        let envelope = Envelope::broadcast_from(
            Command::WorkerAvailable,
            &self.worker_id,
            serde_json::to_value(payload)?,
        );
        self.response.publish(envelope.to_frame()?).await
    }
}
