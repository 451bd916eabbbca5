//! Periodic driver: polls the schedule on a short interval and runs a cycle when due.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::contract::DeliveryChannel;
use crate::coordinator::{CycleOutcome, UploadCoordinator};
use crate::error::{BatchError, BatchResult};
use crate::schedule::ScheduleState;
use crate::store::JsonStore;

pub const DEFAULT_TICK: Duration = Duration::from_secs(30);

/// Load the schedule, rejecting out-of-range times.
pub async fn load_schedule(store: &JsonStore<ScheduleState>) -> BatchResult<ScheduleState> {
    let state = store.load().await?;
    state.validate()?;
    Ok(state)
}

/// Replace the schedule after validating it.
pub async fn reconfigure(store: &JsonStore<ScheduleState>, state: ScheduleState) -> BatchResult<()> {
    state.validate()?;
    store.save(&state).await?;
    info!(enabled = state.enabled, time = %state.time_label(), "Schedule updated");
    Ok(())
}

pub struct Scheduler<C> {
    coordinator: Arc<UploadCoordinator<C>>,
    schedule: Arc<JsonStore<ScheduleState>>,
    tick: Duration,
    last_fired: Option<NaiveDateTime>,
}

impl<C> Scheduler<C>
where
    C: DeliveryChannel + 'static,
{
    pub fn new(coordinator: Arc<UploadCoordinator<C>>, schedule: Arc<JsonStore<ScheduleState>>) -> Self {
        Self {
            coordinator,
            schedule,
            tick: DEFAULT_TICK,
            last_fired: None,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Evaluate the schedule once at `now`. Returns the cycle result if a cycle ran.
    pub async fn tick_at(&mut self, now: NaiveDateTime) -> Option<BatchResult<CycleOutcome>> {
        let state = match load_schedule(&self.schedule).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "[SCHEDULER] Could not read schedule, skipping tick");
                return None;
            }
        };
        if !state.is_due(now, self.last_fired) {
            return None;
        }
        self.last_fired = Some(now);
        info!(time = %state.time_label(), "[SCHEDULER] Schedule due, starting cycle");

        let result = self.coordinator.run_cycle().await;
        if let Err(BatchError::CycleInProgress) = &result {
            info!("[SCHEDULER] A manual cycle is already running, skipping this slot");
        }
        Some(result)
    }

    /// Tick until `shutdown` flips to `true`. The current cycle, if any, finishes first.
    #[instrument(skip_all)]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(tick_secs = self.tick.as_secs(), "[SCHEDULER] Started");
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = Local::now().naive_local();
                    match self.tick_at(now).await {
                        Some(Err(e)) => error!(error = %e, "[SCHEDULER] Scheduled cycle failed"),
                        Some(Ok(outcome)) => debug!(?outcome, "[SCHEDULER] Scheduled cycle finished"),
                        None => {}
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("[SCHEDULER] Shutting down");
                        break;
                    }
                }
            }
        }
    }
}
