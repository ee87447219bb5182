//! Background sweep runner.
//!
//! Replaces the host scheduler's daily/hourly/cron entries with a single
//! tokio task that fires each sweep when its cadence comes due. The
//! runner assumes it is the only scheduler instance; running two
//! replicas would double-process entities (there is no claim/lease).

use super::{ReminderScheduler, SweepSummary};
use crate::config::SchedulerConfig;
use crate::services::metrics::record_sweep_run;
use crate::services::Clock;
use chrono::{NaiveDate, Timelike};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RunnerState {
    last_daily: Option<NaiveDate>,
    last_hourly: Option<(NaiveDate, u32)>,
    last_generation: Option<NaiveDate>,
}

pub struct SweepRunner {
    scheduler: ReminderScheduler,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    state: Mutex<RunnerState>,
    shutdown_token: CancellationToken,
}

impl SweepRunner {
    pub fn new(scheduler: ReminderScheduler, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            scheduler,
            clock,
            config,
            state: Mutex::new(RunnerState::default()),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Run until cancelled. Spawn this on the runtime at startup.
    pub async fn run(self: Arc<Self>) {
        if !self.config.enabled {
            tracing::info!("Sweep runner disabled by configuration");
            return;
        }

        tracing::info!(
            tick_interval_secs = self.config.tick_interval_secs,
            daily_hour = self.config.daily_hour,
            generation_hour = self.config.generation_hour,
            "Sweep runner started"
        );

        let tick = std::time::Duration::from_secs(self.config.tick_interval_secs);
        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Sweep runner shutting down");
                    break;
                }
                _ = tokio::time::sleep(tick) => {
                    self.tick().await;
                }
            }
        }
    }

    async fn tick(&self) {
        let now = self.clock.now();
        let today = self.clock.today();
        let hour = now.hour();

        let mut state = self.state.lock().await;

        if state.last_hourly != Some((today, hour)) {
            state.last_hourly = Some((today, hour));
            self.run_sweep("appointment_reminders", self.scheduler.send_appointment_reminders())
                .await;
        }

        if hour >= self.config.daily_hour && state.last_daily != Some(today) {
            state.last_daily = Some(today);
            self.run_sweep("invoice_reminders", self.scheduler.send_invoice_reminders())
                .await;
            self.run_sweep("tax_deadlines", self.scheduler.check_tax_deadlines())
                .await;
            self.run_sweep("document_expiry", self.scheduler.check_document_expiry())
                .await;
        }

        if hour >= self.config.generation_hour && state.last_generation != Some(today) {
            state.last_generation = Some(today);
            self.run_sweep(
                "recurring_generation",
                self.scheduler.generate_recurring_invoices(),
            )
            .await;
        }
    }

    async fn run_sweep<F>(&self, name: &str, sweep: F)
    where
        F: std::future::Future<Output = Result<SweepSummary, service_core::error::AppError>>,
    {
        match sweep.await {
            Ok(summary) => {
                record_sweep_run(name, "ok");
                tracing::info!(
                    sweep = name,
                    scanned = summary.scanned,
                    dispatched = summary.dispatched,
                    failed = summary.failed,
                    "Sweep completed"
                );
            }
            Err(e) => {
                // The next scheduled run is the retry path.
                record_sweep_run(name, "error");
                tracing::error!(sweep = name, error = %e, "Sweep failed");
            }
        }
    }
}
