//! Bridge from unit-of-work lifecycle events to outbound broadcasts.

use crate::envelope::{Command, Envelope};
use crate::error::AppError;
use crate::identity::WorkerId;
use crate::state::SharedState;
use crate::traits::ResponseChannel;

/// Handle given to a unit-of-work when it begins execution.
///
/// Each method re-publishes the given payload verbatim on the response
/// channel. Publish failures are returned to the caller; the bridge never
/// retries.
#[derive(Debug, Clone)]
pub struct UnitLifecycle<R: ResponseChannel> {
    worker_id: WorkerId,
    unit_id: String,
    state: SharedState,
    response: R,
}

impl<R: ResponseChannel> UnitLifecycle<R> {
    /// Normally created by the dispatcher when a unit is accepted; public so
    /// that units run outside the dispatch path can report the same way.
    pub fn new(worker_id: WorkerId, unit_id: String, state: SharedState, response: R) -> Self {
        Self {
            worker_id,
            unit_id,
            state,
            response,
        }
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    /// Announce that the unit has started executing.
    pub async fn unit_started(&self, payload: serde_json::Value) -> Result<(), AppError> {
        self.publish_as_worker(Command::UnitStarted, payload).await
    }

    /// Announce a progress update.
    pub async fn unit_progress(&self, payload: serde_json::Value) -> Result<(), AppError> {
        self.publish_as_worker(Command::UnitProgress, payload).await
    }

    /// Announce completion. Clears the busy slot, then publishes the
    /// envelope stamped with the unit's own id so that every subscriber
    /// (including this worker's own dispatcher on a shared exchange) can
    /// match it against the unit it knows about.
    pub async fn unit_finished(&self, payload: serde_json::Value) -> Result<(), AppError> {
        self.state.finish_unit();
        let envelope = Envelope::new(
            Command::UnitFinished,
            self.unit_id.clone(),
            crate::envelope::Destination::Broadcast,
            payload,
        );
        self.response.publish(envelope.to_frame()?).await
    }

    async fn publish_as_worker(
        &self,
        command: Command,
        payload: serde_json::Value,
    ) -> Result<(), AppError> {
        let envelope = Envelope::broadcast_from(command, &self.worker_id, payload);
        self.response.publish(envelope.to_frame()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockResponseChannel;

    fn bridge(response: MockResponseChannel) -> (UnitLifecycle<MockResponseChannel>, SharedState) {
        let state = SharedState::new();
        let lifecycle = UnitLifecycle::new(
            WorkerId::from("w-1"),
            "unit-7".to_string(),
            state.clone(),
            response,
        );
        (lifecycle, state)
    }

    #[tokio::test]
    async fn started_and_progress_are_stamped_with_worker_id() {
        let response = MockResponseChannel::new();
        let (lifecycle, _state) = bridge(response.clone());

        lifecycle
            .unit_started(serde_json::json!({"phase": "warmup"}))
            .await
            .unwrap();
        lifecycle
            .unit_progress(serde_json::json!({"done": 3}))
            .await
            .unwrap();

        let published = response.envelopes();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].command, Command::UnitStarted);
        assert_eq!(published[0].sourceid, "w-1");
        assert_eq!(published[0].message["phase"], "warmup");
        assert_eq!(published[1].command, Command::UnitProgress);
        assert_eq!(published[1].message["done"], 3);
    }

    #[tokio::test]
    async fn finished_is_stamped_with_unit_id_and_clears_busy() {
        let response = MockResponseChannel::new();
        let (lifecycle, state) = bridge(response.clone());
        state.begin_unit("unit-7");

        lifecycle
            .unit_finished(serde_json::json!({"processed": 10}))
            .await
            .unwrap();

        assert!(!state.busy());
        let published = response.envelopes();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].command, Command::UnitFinished);
        assert_eq!(published[0].sourceid, "unit-7");
    }

    #[tokio::test]
    async fn publish_failure_propagates_to_caller() {
        let response =
            MockResponseChannel::with_publish_error(AppError::Transport("exchange gone".into()));
        let (lifecycle, state) = bridge(response);
        state.begin_unit("unit-7");

        let err = lifecycle
            .unit_finished(serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));

        // The slot is still released; the failure concerns the announcement.
        assert!(!state.busy());
    }
}
