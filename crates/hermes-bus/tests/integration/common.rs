use std::time::Duration;

use hermes_bus::{InProcessExchange, Publisher, Subscription};
use hermes_core::coordinator::{CoordinatorConfig, WorkerCoordinator};
use hermes_core::envelope::Envelope;
use hermes_core::testutil::{MockReporter, MockUnit};
use hermes_core::traits::RequestChannel;

pub const REQUESTS: &str = "hermes.requests";
pub const RESPONSES: &str = "hermes.responses";

pub type TestWorker = WorkerCoordinator<Subscription, Publisher, MockUnit, MockReporter>;

/// Build and start a worker on the given request/response channel names.
pub fn start_worker(
    exchange: &InProcessExchange,
    worker_id: &str,
    unit: MockUnit,
    requests: &str,
    responses: &str,
) -> TestWorker {
    let config = CoordinatorConfig::default()
        .with_worker_id(worker_id)
        .with_heartbeat_interval(Duration::from_millis(10));
    let mut worker = WorkerCoordinator::new(
        config,
        exchange.subscribe(requests),
        exchange.publisher(responses),
        unit,
        MockReporter::new(),
    );
    worker.start().expect("fresh worker starts");
    worker
}

/// Read frames off a subscription until one matches, or the deadline passes.
pub async fn wait_for(
    subscription: &mut Subscription,
    deadline: Duration,
    mut predicate: impl FnMut(&Envelope) -> bool,
) -> Option<Envelope> {
    let result = tokio::time::timeout(deadline, async {
        loop {
            match subscription.recv().await {
                Ok(Some(frame)) => {
                    if let Ok(envelope) = Envelope::from_frame(&frame)
                        && predicate(&envelope)
                    {
                        return Some(envelope);
                    }
                }
                Ok(None) => return None,
                // Lag only loses old frames; keep reading.
                Err(_) => {}
            }
        }
    })
    .await;
    result.unwrap_or(None)
}

/// Poll a condition every few milliseconds until it holds or two seconds
/// pass. Returns whether it held.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Collect every envelope seen within the window.
pub async fn collect_for(subscription: &mut Subscription, window: Duration) -> Vec<Envelope> {
    let mut seen = Vec::new();
    let _ = tokio::time::timeout(window, async {
        loop {
            match subscription.recv().await {
                Ok(Some(frame)) => {
                    if let Ok(envelope) = Envelope::from_frame(&frame) {
                        seen.push(envelope);
                    }
                }
                Ok(None) => break,
                Err(_) => {}
            }
        }
    })
    .await;
    seen
}
