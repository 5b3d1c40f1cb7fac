use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broadcaster::AvailabilityBroadcaster;
use crate::dispatcher::CommandDispatcher;
use crate::error::AppError;
use crate::identity::WorkerId;
use crate::lifecycle::UnitLifecycle;
use crate::reporter::{CoordinatorEvent, EventReporter};
use crate::state::{SharedState, StateSnapshot};
use crate::traits::{RequestChannel, ResponseChannel, WorkUnit};

/// Configuration for a worker coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub worker_id: WorkerId,
    pub heartbeat_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_id: WorkerId::generate(),
            heartbeat_interval: Duration::from_secs(1),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_worker_id(mut self, id: impl Into<WorkerId>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

/// Top-level worker object: owns the unit slot, consumes the request
/// channel, and announces availability.
///
/// The coordinator spawns its consume loop and broadcaster as tasks rather
/// than being one, so [`stop`](WorkerCoordinator::stop) is safe to call from
/// any context, including from inside a command handler running on the
/// consume task itself.
pub struct WorkerCoordinator<Q, R, U, RP>
where
    Q: RequestChannel,
    R: ResponseChannel,
    U: WorkUnit,
    RP: EventReporter + 'static,
{
    config: CoordinatorConfig,
    state: SharedState,
    request: Option<Q>,
    response: R,
    unit: U,
    reporter: Arc<RP>,
    cancel_token: CancellationToken,
    consume_handle: Option<JoinHandle<Result<(), AppError>>>,
    heartbeat_handle: Option<JoinHandle<Result<(), AppError>>>,
}

impl<Q, R, U, RP> WorkerCoordinator<Q, R, U, RP>
where
    Q: RequestChannel,
    R: ResponseChannel,
    U: WorkUnit,
    RP: EventReporter + 'static,
{
    pub fn new(config: CoordinatorConfig, request: Q, response: R, unit: U, reporter: RP) -> Self {
        Self {
            config,
            state: SharedState::new(),
            request: Some(request),
            response,
            unit,
            reporter: Arc::new(reporter),
            cancel_token: CancellationToken::new(),
            consume_handle: None,
            heartbeat_handle: None,
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.config.worker_id
    }

    pub fn is_busy(&self) -> bool {
        self.state.busy()
    }

    pub fn state_snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Lifecycle bridge for the current unit-of-work, for callers that run a
    /// unit outside the dispatch path.
    pub fn lifecycle(&self) -> UnitLifecycle<R> {
        UnitLifecycle::new(
            self.config.worker_id.clone(),
            self.unit.unit_id(),
            self.state.clone(),
            self.response.clone(),
        )
    }

    /// Begin consuming the request channel and announcing availability.
    ///
    /// Errors with [`AppError::AlreadyStarted`] on a second call.
    pub fn start(&mut self) -> Result<(), AppError> {
        let request = self.request.take().ok_or(AppError::AlreadyStarted)?;

        self.reporter.report(CoordinatorEvent::Started {
            worker_id: &self.config.worker_id,
        });

        let broadcaster = AvailabilityBroadcaster::new(
            self.config.worker_id.clone(),
            self.state.clone(),
            self.response.clone(),
            self.config.heartbeat_interval,
        );
        self.heartbeat_handle = Some(tokio::spawn(
            broadcaster.run(self.cancel_token.clone(), self.reporter.clone()),
        ));

        let dispatcher = CommandDispatcher::new(
            self.config.worker_id.clone(),
            self.state.clone(),
            self.unit.clone(),
            self.response.clone(),
            self.cancel_token.clone(),
        );
        self.consume_handle = Some(tokio::spawn(consume_loop(
            request,
            dispatcher,
            self.config.worker_id.clone(),
            self.cancel_token.clone(),
            self.reporter.clone(),
        )));

        Ok(())
    }

    /// Signal shutdown: halt the unit, cancel the consume loop and the
    /// broadcaster. Non-blocking and idempotent.
    pub fn stop(&self) {
        self.reporter.report(CoordinatorEvent::ShuttingDown {
            worker_id: &self.config.worker_id,
        });
        self.unit.halt();
        self.cancel_token.cancel();
    }

    /// Wait for both tasks to wind down. Returns the first task error, if
    /// any. Call after `stop()`, or after a shutdown command was consumed.
    pub async fn join(&mut self) -> Result<(), AppError> {
        for handle in [self.consume_handle.take(), self.heartbeat_handle.take()]
            .into_iter()
            .flatten()
        {
            match handle.await {
                Ok(result) => result?,
                Err(e) if e.is_cancelled() => {}
                Err(e) => return Err(AppError::Generic(format!("worker task panicked: {e}"))),
            }
        }
        Ok(())
    }
}

/// Sequential envelope consumption: one frame at a time, so busy-state
/// transitions are atomic with respect to other inbound commands.
async fn consume_loop<Q, R, U, RP>(
    mut request: Q,
    dispatcher: CommandDispatcher<R, U>,
    worker_id: WorkerId,
    cancel_token: CancellationToken,
    reporter: Arc<RP>,
) -> Result<(), AppError>
where
    Q: RequestChannel,
    R: ResponseChannel,
    U: WorkUnit,
    RP: EventReporter,
{
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            next = request.recv() => match next {
                Ok(Some(frame)) => {
                    if let Err(e) = dispatcher.handle_frame(&frame, reporter.as_ref()).await {
                        tracing::error!(error = %e, "Failed to publish reply");
                    }
                }
                Ok(None) => {
                    tracing::info!(%worker_id, "Request channel closed");
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "Request channel hiccup");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Request channel failed");
                    return Err(e);
                }
            }
        }
    }

    reporter.report(CoordinatorEvent::Stopped {
        worker_id: &worker_id,
    });
    Ok(())
}
