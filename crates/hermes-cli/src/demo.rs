//! Demo unit-of-work for the local fleet simulator.
//!
//! Stands in for a real scraper: it "processes" a page list derived from the
//! dispatched target with a fixed per-page delay, reporting progress and
//! completion through the lifecycle bridge.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use hermes_core::error::AppError;
use hermes_core::lifecycle::UnitLifecycle;
use hermes_core::traits::{ResponseChannel, UnitSnapshot, WorkUnit};

#[derive(Debug, Default)]
struct DemoInner {
    input: serde_json::Value,
    target: Option<String>,
    pages: Vec<String>,
    processed: u64,
    failed: u64,
    halted: bool,
    running: bool,
}

/// A unit that pretends to scrape `pages` pages under a dispatched target.
///
/// Input payload shape: `{"target": "<url>", "pages": <n>}` (`pages`
/// defaults to 3).
#[derive(Debug, Clone)]
pub struct DemoUnit {
    id: String,
    page_delay: Duration,
    inner: Arc<Mutex<DemoInner>>,
}

impl DemoUnit {
    pub fn new(page_delay: Duration) -> Self {
        Self {
            id: format!("unit-{}", Uuid::new_v4()),
            page_delay,
            inner: Arc::new(Mutex::new(DemoInner::default())),
        }
    }

    async fn run<R: ResponseChannel>(&self, lifecycle: UnitLifecycle<R>) -> Result<(), AppError> {
        let (input, pages) = {
            let inner = self.lock();
            (inner.input.clone(), inner.pages.clone())
        };
        lifecycle.unit_started(input).await?;

        for page in &pages {
            tokio::time::sleep(self.page_delay).await;
            {
                let mut inner = self.lock();
                if inner.halted {
                    break;
                }
                inner.processed += 1;
            }
            let processed = self.lock().processed;
            lifecycle
                .unit_progress(serde_json::json!({
                    "page": page,
                    "processedCount": processed,
                    "itemCount": pages.len(),
                }))
                .await?;
        }

        let (target, processed, failed) = {
            let inner = self.lock();
            (inner.target.clone(), inner.processed, inner.failed)
        };
        lifecycle
            .unit_finished(serde_json::json!({
                "target": target,
                "processedCount": processed,
                "failedCount": failed,
            }))
            .await
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DemoInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WorkUnit for DemoUnit {
    fn unit_id(&self) -> String {
        self.id.clone()
    }

    fn load(&self, input: serde_json::Value) -> Result<(), AppError> {
        let target = input
            .get("target")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Unit("dispatch payload is missing \"target\"".into()))?
            .to_string();
        let pages = input.get("pages").and_then(|v| v.as_u64()).unwrap_or(3);

        let mut inner = self.lock();
        inner.pages = (1..=pages).map(|n| format!("{target}/page/{n}")).collect();
        inner.target = Some(target);
        inner.input = input;
        inner.processed = 0;
        inner.failed = 0;
        inner.halted = false;
        Ok(())
    }

    async fn begin<R: ResponseChannel>(&self, lifecycle: UnitLifecycle<R>) -> Result<(), AppError> {
        {
            let mut inner = self.lock();
            if inner.running {
                return Ok(());
            }
            inner.running = true;
        }

        let unit = self.clone();
        tokio::spawn(async move {
            if let Err(e) = unit.run(lifecycle).await {
                tracing::warn!(error = %e, "Demo unit could not report its lifecycle");
            }
            unit.lock().running = false;
        });
        Ok(())
    }

    fn reset(&self) {
        let mut inner = self.lock();
        inner.processed = 0;
        inner.failed = 0;
    }

    fn halt(&self) {
        self.lock().halted = true;
    }

    fn snapshot(&self) -> UnitSnapshot {
        let inner = self.lock();
        UnitSnapshot {
            item_count: inner.pages.len() as u64,
            processed_count: inner.processed,
            failed_count: inner.failed,
            target: inner.target.clone(),
            input: inner.input.clone(),
        }
    }
}
