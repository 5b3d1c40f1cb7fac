mod demo;

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hermes_bus::{InProcessExchange, Publisher, Subscription};
use hermes_core::coordinator::{CoordinatorConfig, WorkerCoordinator};
use hermes_core::envelope::{Command, Destination, Envelope};
use hermes_core::identity::WorkerId;
use hermes_core::reporter::TracingReporter;
use hermes_core::traits::{RequestChannel, ResponseChannel};

use crate::demo::DemoUnit;

/// Logical channel carrying orchestrator commands.
const REQUESTS: &str = "hermes.requests";
/// Logical channel carrying worker announcements and reports.
const RESPONSES: &str = "hermes.responses";

#[derive(Parser)]
#[command(name = "hermes", version, about = "Scraper fleet coordination over a fanout exchange")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a local fleet of demo scrape workers on an in-process exchange
    Simulate {
        /// Number of workers to start
        #[arg(short, long, default_value_t = 2)]
        workers: usize,

        /// Number of units of work to dispatch
        #[arg(short, long, default_value_t = 4)]
        units: usize,

        /// Availability heartbeat interval in milliseconds
        #[arg(long, default_value_t = 200, env = "HERMES_HEARTBEAT_MS")]
        heartbeat_ms: u64,

        /// Simulated per-page scrape delay in milliseconds
        #[arg(long, default_value_t = 50)]
        page_delay_ms: u64,

        /// Give up if the fleet has not drained the units by then
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hermes=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            workers,
            units,
            heartbeat_ms,
            page_delay_ms,
            timeout_secs,
        } => {
            cmd_simulate(
                workers,
                units,
                Duration::from_millis(heartbeat_ms),
                Duration::from_millis(page_delay_ms),
                Duration::from_secs(timeout_secs),
            )
            .await?;
        }
    }

    Ok(())
}

type FleetWorker = WorkerCoordinator<Subscription, Publisher, DemoUnit, TracingReporter>;

async fn cmd_simulate(
    workers: usize,
    units: usize,
    heartbeat: Duration,
    page_delay: Duration,
    timeout: Duration,
) -> Result<()> {
    if workers == 0 {
        bail!("a fleet needs at least one worker");
    }

    let exchange = InProcessExchange::default();

    let mut fleet: Vec<FleetWorker> = Vec::with_capacity(workers);
    for _ in 0..workers {
        let config = CoordinatorConfig::default().with_heartbeat_interval(heartbeat);
        let mut worker = WorkerCoordinator::new(
            config,
            exchange.subscribe(REQUESTS),
            exchange.publisher(RESPONSES),
            DemoUnit::new(page_delay),
            TracingReporter,
        );
        worker.start().context("Failed to start worker")?;
        fleet.push(worker);
    }
    tracing::info!(workers, units, "Fleet online, dispatching units");

    let outcome = tokio::time::timeout(timeout, orchestrate(&exchange, units)).await;

    // Wind the fleet down whatever happened above.
    exchange
        .publisher(REQUESTS)
        .publish(Envelope::global_shutdown().to_frame()?)
        .await
        .context("Failed to publish global shutdown")?;
    for worker in &mut fleet {
        worker.join().await.context("Worker failed to wind down")?;
    }

    let stats = match outcome {
        Ok(result) => result?,
        Err(_) => bail!("Fleet did not drain {units} units within {timeout:?}"),
    };

    println!("Simulation complete: {} units finished", stats.finished);
    let mut per_worker: Vec<_> = stats.units_by_worker.into_iter().collect();
    per_worker.sort();
    for (worker_id, count) in per_worker {
        println!("  {worker_id}: {count} units");
    }

    Ok(())
}

#[derive(Debug, Default)]
struct SimulationStats {
    finished: usize,
    units_by_worker: HashMap<String, usize>,
}

/// Play the central orchestrator: hand a unit to every worker that
/// advertises availability until the batch is drained.
async fn orchestrate(exchange: &InProcessExchange, units: usize) -> Result<SimulationStats> {
    let mut responses = exchange.subscribe(RESPONSES);
    let requests = exchange.publisher(REQUESTS);

    let mut stats = SimulationStats::default();
    let mut dispatched = 0usize;
    // Workers we believe to be mid-unit, and which target each one holds.
    let mut outstanding: HashMap<String, String> = HashMap::new();
    let mut status_requested = false;

    while stats.finished < units {
        let frame = match responses.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => bail!("response channel closed mid-simulation"),
            Err(e) => {
                tracing::warn!(error = %e, "Response channel hiccup");
                continue;
            }
        };
        let Ok(envelope) = Envelope::from_frame(&frame) else {
            continue;
        };

        match envelope.command {
            Command::WorkerAvailable => {
                let worker = envelope.sourceid.clone();
                if dispatched < units && !outstanding.contains_key(&worker) {
                    let target = format!("https://example.com/batch/{dispatched}");
                    let dispatch = Envelope::dispatch_to(
                        &WorkerId::from(worker.as_str()),
                        serde_json::json!({"target": target, "pages": 3}),
                    );
                    requests.publish(dispatch.to_frame()?).await?;
                    outstanding.insert(worker.clone(), target);
                    dispatched += 1;
                    tracing::info!(%worker, dispatched, "Unit dispatched");
                }
            }
            Command::UnitFinished => {
                let target = envelope.message["target"].as_str().unwrap_or_default();
                let Some(worker) = outstanding
                    .iter()
                    .find(|(_, t)| t.as_str() == target)
                    .map(|(w, _)| w.clone())
                else {
                    continue;
                };
                outstanding.remove(&worker);
                stats.finished += 1;
                *stats.units_by_worker.entry(worker.clone()).or_default() += 1;
                tracing::info!(%worker, finished = stats.finished, "Unit finished");

                // One round of status sampling once the batch is fully out.
                if dispatched == units && !status_requested {
                    status_requested = true;
                    requests
                        .publish(Envelope::simple_status_request(Destination::Broadcast).to_frame()?)
                        .await?;
                }
            }
            Command::WorkerStatusSimple => {
                tracing::info!(
                    worker = %envelope.sourceid,
                    busy = %envelope.message["busy"],
                    processed = %envelope.message["processedCount"],
                    "Worker status"
                );
            }
            _ => {}
        }
    }

    Ok(stats)
}
