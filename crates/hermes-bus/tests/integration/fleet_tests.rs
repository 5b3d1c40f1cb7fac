use std::time::Duration;

use hermes_bus::InProcessExchange;
use hermes_core::envelope::{Command, Destination, Envelope, SimpleStatusPayload};
use hermes_core::identity::WorkerId;
use hermes_core::testutil::MockUnit;
use hermes_core::traits::{ResponseChannel, UnitSnapshot};

use crate::integration::common::{
    REQUESTS, RESPONSES, collect_for, eventually, start_worker, wait_for,
};

const DEADLINE: Duration = Duration::from_secs(2);
const WINDOW: Duration = Duration::from_millis(80);

#[tokio::test]
async fn worker_announces_availability_on_start() {
    let exchange = InProcessExchange::default();
    let mut responses = exchange.subscribe(RESPONSES);

    let mut worker = start_worker(
        &exchange,
        "w-1",
        MockUnit::with_id("u-1"),
        REQUESTS,
        RESPONSES,
    );

    let announcement = wait_for(&mut responses, DEADLINE, |e| {
        e.command == Command::WorkerAvailable && e.sourceid == "w-1"
    })
    .await
    .expect("fresh worker self-registers");
    assert!(announcement.message.get("availableSince").is_some());

    worker.stop();
    worker.join().await.unwrap();
}

#[tokio::test]
async fn busy_worker_stays_quiet_until_its_unit_finishes() {
    let exchange = InProcessExchange::default();
    let mut responses = exchange.subscribe(RESPONSES);
    let requests = exchange.publisher(REQUESTS);

    let mut worker = start_worker(
        &exchange,
        "w-1",
        MockUnit::with_id("u-1"),
        REQUESTS,
        RESPONSES,
    );

    let dispatch = Envelope::dispatch_to(&WorkerId::from("w-1"), serde_json::json!({"target": "x"}));
    requests
        .publish(dispatch.to_frame().unwrap())
        .await
        .unwrap();

    assert!(eventually(|| worker.is_busy()).await);

    // Drain announcements that predate the dispatch before sampling.
    let _ = collect_for(&mut responses, WINDOW).await;
    let while_busy = collect_for(&mut responses, WINDOW).await;
    assert!(
        while_busy
            .iter()
            .all(|e| e.command != Command::WorkerAvailable),
        "busy worker must not advertise availability"
    );

    // The unit reports completion through the lifecycle bridge.
    worker
        .lifecycle()
        .unit_finished(serde_json::json!({"processed": 1}))
        .await
        .unwrap();

    assert!(!worker.is_busy());
    wait_for(&mut responses, DEADLINE, |e| {
        e.command == Command::WorkerAvailable
    })
    .await
    .expect("availability resumes after the unit finishes");

    worker.stop();
    worker.join().await.unwrap();
}

#[tokio::test]
async fn single_exchange_deployment_echoes_unit_lifecycle() {
    // Request and response traffic share one physical channel; the worker
    // hears its own unit's announcements and other workers' heartbeats.
    let exchange = InProcessExchange::default();
    const BUS: &str = "hermes.bus";
    let mut observer = exchange.subscribe(BUS);
    let orchestrator = exchange.publisher(BUS);

    let mut worker = start_worker(
        &exchange,
        "w-1",
        MockUnit::with_id("u-1").finishing(),
        BUS,
        BUS,
    );

    let dispatch = Envelope::dispatch_to(&WorkerId::from("w-1"), serde_json::json!({"target": "x"}));
    orchestrator
        .publish(dispatch.to_frame().unwrap())
        .await
        .unwrap();

    wait_for(&mut observer, DEADLINE, |e| {
        e.command == Command::UnitStarted && e.sourceid == "w-1"
    })
    .await
    .expect("unit start announced");
    wait_for(&mut observer, DEADLINE, |e| {
        e.command == Command::UnitFinished && e.sourceid == "u-1"
    })
    .await
    .expect("unit finish announced under the unit's own id");

    assert!(!worker.is_busy());
    wait_for(&mut observer, DEADLINE, |e| {
        e.command == Command::WorkerAvailable
    })
    .await
    .expect("worker advertises again");

    worker.stop();
    worker.join().await.unwrap();
}

#[tokio::test]
async fn dispatch_reaches_only_the_addressed_worker() {
    let exchange = InProcessExchange::default();
    let requests = exchange.publisher(REQUESTS);
    let mut responses = exchange.subscribe(RESPONSES);

    let unit_one = MockUnit::with_id("u-1");
    let unit_two = MockUnit::with_id("u-2");
    let mut w1 = start_worker(&exchange, "w-1", unit_one.clone(), REQUESTS, RESPONSES);
    let mut w2 = start_worker(&exchange, "w-2", unit_two.clone(), REQUESTS, RESPONSES);

    let dispatch = Envelope::dispatch_to(&WorkerId::from("w-1"), serde_json::json!({"target": "x"}));
    requests
        .publish(dispatch.to_frame().unwrap())
        .await
        .unwrap();

    assert!(eventually(|| w1.is_busy()).await);
    assert!(!w2.is_busy());
    assert_eq!(unit_one.begin_count(), 1);
    assert_eq!(unit_two.begin_count(), 0);

    // A status request addressed to w-2 draws exactly one reply.
    let ask = Envelope::status_request(Destination::Worker(WorkerId::from("w-2")));
    requests.publish(ask.to_frame().unwrap()).await.unwrap();

    let status = wait_for(&mut responses, DEADLINE, |e| {
        e.command == Command::WorkerStatus
    })
    .await
    .expect("w-2 replies");
    assert_eq!(status.sourceid, "w-2");
    assert_eq!(status.message["status"]["busy"], false);

    let extras = collect_for(&mut responses, WINDOW).await;
    assert!(
        extras.iter().all(|e| e.command != Command::WorkerStatus),
        "only the addressed worker replies"
    );

    w1.stop();
    w2.stop();
    w1.join().await.unwrap();
    w2.join().await.unwrap();
}

#[tokio::test]
async fn simple_status_reflects_unit_progress() {
    let exchange = InProcessExchange::default();
    let requests = exchange.publisher(REQUESTS);
    let mut responses = exchange.subscribe(RESPONSES);

    let unit = MockUnit::with_id("u-1").with_snapshot(UnitSnapshot {
        item_count: 12,
        processed_count: 7,
        failed_count: 2,
        target: Some("https://example.com/catalog".to_string()),
        input: serde_json::json!({"target": "https://example.com/catalog"}),
    });
    let mut worker = start_worker(&exchange, "w-1", unit, REQUESTS, RESPONSES);

    let ask = Envelope::simple_status_request(Destination::Broadcast);
    requests.publish(ask.to_frame().unwrap()).await.unwrap();

    let reply = wait_for(&mut responses, DEADLINE, |e| {
        e.command == Command::WorkerStatusSimple
    })
    .await
    .expect("status reply");
    let payload: SimpleStatusPayload = serde_json::from_value(reply.message).unwrap();
    assert!(!payload.busy);
    assert_eq!(payload.item_count, 12);
    assert_eq!(payload.processed_count, 7);
    assert_eq!(payload.failed_count, 2);
    assert_eq!(payload.target_descriptor, "https://example.com/catalog");

    worker.stop();
    worker.join().await.unwrap();
}

#[tokio::test]
async fn global_shutdown_stops_the_whole_fleet() {
    let exchange = InProcessExchange::default();
    let requests = exchange.publisher(REQUESTS);
    let mut responses = exchange.subscribe(RESPONSES);

    let unit_one = MockUnit::with_id("u-1");
    let unit_two = MockUnit::with_id("u-2");
    let mut w1 = start_worker(&exchange, "w-1", unit_one.clone(), REQUESTS, RESPONSES);
    let mut w2 = start_worker(&exchange, "w-2", unit_two.clone(), REQUESTS, RESPONSES);

    // w-1 is mid-unit; shutdown is unconditional.
    let dispatch = Envelope::dispatch_to(&WorkerId::from("w-1"), serde_json::json!({"target": "x"}));
    requests
        .publish(dispatch.to_frame().unwrap())
        .await
        .unwrap();
    assert!(eventually(|| w1.is_busy()).await);

    requests
        .publish(Envelope::global_shutdown().to_frame().unwrap())
        .await
        .unwrap();

    tokio::time::timeout(DEADLINE, w1.join())
        .await
        .expect("w-1 wound down")
        .unwrap();
    tokio::time::timeout(DEADLINE, w2.join())
        .await
        .expect("w-2 wound down")
        .unwrap();
    assert_eq!(unit_one.halt_count(), 1);
    assert_eq!(unit_two.halt_count(), 1);

    // The channel goes quiet: no heartbeats survive shutdown.
    let _ = collect_for(&mut responses, WINDOW).await;
    let after = collect_for(&mut responses, WINDOW).await;
    assert!(after.is_empty());
}
