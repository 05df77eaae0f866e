//! Cron-driven cycle loop with graceful shutdown

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::runtime::TradingRuntime;
use crate::error::{EngineError, EngineResult};

/// Ticks the runtime on a fixed cadence. A cycle always runs to completion;
/// shutdown is observed only between cycles.
pub struct CycleScheduler {
    schedule: Schedule,
    cron_expr: String,
    interval_seconds: u64,
}

/// Cron expression (with seconds field) firing every `interval_seconds`
pub fn interval_to_cron(interval_seconds: u64) -> String {
    if interval_seconds >= 60 {
        format!("0 */{} * * * *", interval_seconds / 60)
    } else {
        format!("*/{} * * * * *", interval_seconds)
    }
}

impl CycleScheduler {
    pub fn new(interval_seconds: u64) -> EngineResult<Self> {
        if interval_seconds == 0 {
            return Err(EngineError::Scheduler(
                "interval_seconds must be > 0".to_string(),
            ));
        }
        let cron_expr = interval_to_cron(interval_seconds);
        let schedule = Schedule::from_str(&cron_expr).map_err(|e| {
            EngineError::Scheduler(format!("invalid cron expression '{}': {}", cron_expr, e))
        })?;

        info!(
            interval = interval_seconds,
            cron = %cron_expr,
            "CycleScheduler: created with interval {}s (cron: {})",
            interval_seconds,
            cron_expr
        );

        Ok(Self {
            schedule,
            cron_expr,
            interval_seconds,
        })
    }

    pub fn cron_expression(&self) -> &str {
        &self.cron_expr
    }

    pub fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    /// First tick strictly after `after`
    pub fn next_tick(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Run cycles until `shutdown` is cancelled, then publish the final
    /// state. Returns the number of completed cycles.
    pub async fn run(&self, runtime: &mut TradingRuntime, shutdown: CancellationToken) -> u64 {
        info!("CycleScheduler: started, waiting for first tick...");
        let mut cycles = 0u64;

        while !shutdown.is_cancelled() {
            let now = Utc::now();
            let Some(next_tick) = self.next_tick(now) else {
                warn!("CycleScheduler: schedule exhausted");
                break;
            };
            let wait = (next_tick - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            runtime.run_cycle().await;
            cycles += 1;
        }

        info!(cycles = cycles, "CycleScheduler: shutdown requested after {} cycles", cycles);
        runtime.shutdown().await;
        cycles
    }
}
