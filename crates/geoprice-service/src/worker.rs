//! # Batch Worker
//!
//! Background task that runs batch pages as queued job units.
//!
//! ## Worker Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BatchWorker::run                                 │
//! │                                                                         │
//! │  ┌────────────────┐   schedule()    ┌──────────────────────────────┐   │
//! │  │ BatchWorker-   │ ──────────────► │ batch_scheduled option       │   │
//! │  │ Handle         │  (claims flag,  │ INSERT ... DO NOTHING        │   │
//! │  └───────┬────────┘   winner only)  └──────────────────────────────┘   │
//! │          │ BatchJob { run_id, offset: 0 }                               │
//! │          ▼                                                              │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  select!                                                        │   │
//! │  │   job      ──► flag still names run_id? ──no──► drop job        │   │
//! │  │                  │ yes                                          │   │
//! │  │                  ▼                                              │   │
//! │  │               process_page(offset)                              │   │
//! │  │                  ├── Next(n)   ──► enqueue BatchJob { n }       │   │
//! │  │                  └── Completed ──► idle                         │   │
//! │  │                                                                 │   │
//! │  │   tick     ──► idle but flag set? ──► enqueue offset 0          │   │
//! │  │   shutdown ──► break                                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the job a run expects next is executed, so a page queued twice (by
//! the handle and by a tick) runs once. A failed page leaves the scheduled
//! flag in place and the next tick restarts the run from offset 0, which is
//! safe because conversion never overwrites.
//! Clearing the flag stops a run after its current page.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use geoprice_db::{OptionsRepository, ScheduledRun};

use crate::batch::{BatchRunner, PageOutcome};
use crate::error::{ServiceError, ServiceResult};

// =============================================================================
// Jobs
// =============================================================================

/// One unit of work: a single page of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchJob {
    pub run_id: Uuid,
    pub offset: u32,
}

impl BatchJob {
    /// First page of a run.
    pub fn start(run: &ScheduledRun) -> Self {
        BatchJob {
            run_id: run.run_id,
            offset: 0,
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Handle for scheduling runs and stopping the worker.
#[derive(Debug, Clone)]
pub struct BatchWorkerHandle {
    options: OptionsRepository,
    jobs_tx: mpsc::UnboundedSender<BatchJob>,
    shutdown_tx: mpsc::Sender<()>,
}

impl BatchWorkerHandle {
    /// Schedules a run unless one is already pending.
    ///
    /// ## Returns
    /// The new run's ID, or `None` when the call was a duplicate.
    pub async fn schedule(&self) -> ServiceResult<Option<Uuid>> {
        let Some(run) = self.options.try_schedule_batch().await? else {
            debug!("Batch run already scheduled, ignoring");
            return Ok(None);
        };

        self.jobs_tx
            .send(BatchJob::start(&run))
            .map_err(|_| ServiceError::ShuttingDown)?;

        info!(run_id = %run.run_id, "Batch run scheduled");
        Ok(Some(run.run_id))
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> ServiceResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| ServiceError::ChannelError("Shutdown channel closed".into()))
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Runs batch jobs one at a time.
pub struct BatchWorker {
    runner: BatchRunner,
    options: OptionsRepository,
    jobs_tx: mpsc::UnboundedSender<BatchJob>,
    jobs_rx: mpsc::UnboundedReceiver<BatchJob>,
    shutdown_rx: mpsc::Receiver<()>,
    poll_interval: std::time::Duration,

    /// The job the current run expects next. Anything else is stale.
    expected: Option<BatchJob>,
}

impl BatchWorker {
    /// Creates a worker and returns a handle.
    pub fn new(runner: BatchRunner, poll_interval: std::time::Duration) -> (Self, BatchWorkerHandle) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let options = runner.context().db().options();

        let handle = BatchWorkerHandle {
            options: options.clone(),
            jobs_tx: jobs_tx.clone(),
            shutdown_tx,
        };

        let worker = BatchWorker {
            runner,
            options,
            jobs_tx,
            jobs_rx,
            shutdown_rx,
            poll_interval,
            expected: None,
        };

        (worker, handle)
    }

    /// Runs the worker loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Batch worker starting");

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(job) = self.jobs_rx.recv() => {
                    self.run_job(job).await;
                }

                _ = interval.tick() => {
                    if let Err(e) = self.resume_pending().await {
                        error!(error = %e, "Failed to check for scheduled batch run");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Batch worker shutting down");
                    break;
                }
            }
        }

        info!("Batch worker stopped");
    }

    /// Runs one page and enqueues the continuation.
    async fn run_job(&mut self, job: BatchJob) {
        if let Some(expected) = self.expected {
            if expected != job {
                debug!(run_id = %job.run_id, offset = job.offset, "Duplicate or stale job, dropping");
                return;
            }
        }

        match self.options.scheduled_batch().await {
            Ok(Some(run)) if run.run_id == job.run_id => {}
            Ok(_) => {
                info!(run_id = %job.run_id, offset = job.offset, "Run no longer scheduled, dropping job");
                self.finish(job.run_id);
                return;
            }
            Err(e) => {
                error!(error = %e, "Failed to read batch schedule");
                self.finish(job.run_id);
                return;
            }
        }

        self.expected = Some(job);

        match self.runner.process_page(job.offset).await {
            Ok(report) => match report.outcome {
                PageOutcome::Next(offset) => {
                    let next = BatchJob {
                        run_id: job.run_id,
                        offset,
                    };
                    self.expected = Some(next);
                    if self.jobs_tx.send(next).is_err() {
                        warn!(run_id = %job.run_id, "Job queue closed, run will resume on restart");
                        self.finish(job.run_id);
                    }
                }
                PageOutcome::Completed => self.finish(job.run_id),
            },
            Err(e) => {
                error!(
                    run_id = %job.run_id,
                    offset = job.offset,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Batch page failed, run will restart on the next tick"
                );
                self.finish(job.run_id);
            }
        }
    }

    /// Picks up a scheduled run nothing is working on.
    ///
    /// Covers runs scheduled by another process and runs interrupted by a
    /// failure or restart.
    async fn resume_pending(&mut self) -> ServiceResult<()> {
        if self.expected.is_some() {
            return Ok(());
        }
        let Some(run) = self.options.scheduled_batch().await? else {
            return Ok(());
        };

        info!(run_id = %run.run_id, "Resuming scheduled batch run");
        let job = BatchJob::start(&run);
        self.expected = Some(job);
        self.jobs_tx
            .send(job)
            .map_err(|_| ServiceError::ShuttingDown)
    }

    fn finish(&mut self, run_id: Uuid) {
        if self.expected.map(|job| job.run_id) == Some(run_id) {
            self.expected = None;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeoPriceConfig;
    use crate::context::PricingContext;
    use geoprice_db::{Database, DbConfig, NewProduct};
    use rust_decimal::Decimal;
    use std::time::Duration;

    async fn setup() -> (BatchWorker, BatchWorkerHandle, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = GeoPriceConfig::default();
        let ctx = PricingContext::from_config(db.clone(), &config).unwrap();
        let runner = BatchRunner::new(ctx, config.batch.clone());
        let (worker, handle) = BatchWorker::new(runner, Duration::from_secs(3600));
        (worker, handle, db)
    }

    async fn wait_for_completion(db: &Database) {
        for _ in 0..200 {
            if db.options().batch_completed_at().await.unwrap().is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("batch run did not complete");
    }

    #[tokio::test]
    async fn test_schedule_is_idempotent() {
        let (_worker, handle, _db) = setup().await;
        assert!(handle.schedule().await.unwrap().is_some());
        assert!(handle.schedule().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_worker_completes_run() {
        let (worker, handle, db) = setup().await;
        let product = db
            .products()
            .insert(&NewProduct::published("Shirt", Decimal::new(100, 0)))
            .await
            .unwrap();

        let task = tokio::spawn(worker.run());
        handle.schedule().await.unwrap().unwrap();
        wait_for_completion(&db).await;

        let loaded = db.products().load_prices(&product.id).await.unwrap().unwrap();
        assert!(loaded.prices_ready);
        assert!(db.options().scheduled_batch().await.unwrap().is_none());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_cleared_flag_drops_job() {
        let (mut worker, handle, db) = setup().await;
        let run_id = handle.schedule().await.unwrap().unwrap();
        db.options().clear_scheduled_batch().await.unwrap();

        worker.run_job(BatchJob { run_id, offset: 0 }).await;
        assert!(worker.expected.is_none());
        assert!(db.options().batch_completed_at().await.unwrap().is_none());
    }
}
