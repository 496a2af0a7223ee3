//! Scheduled and on-demand workflow runs, at most one at a time.

use chrono::{Local, NaiveDateTime, NaiveTime};
use quill_common::{CancelSignal, QuillError, Result};
use quill_index::FileLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use crate::workflow::{Workflow, WorkflowResult};

/// When scheduled runs fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Once a day at this local wall-clock time
    Daily(NaiveTime),
    /// On a fixed interval from the previous run's completion
    Every(Duration),
}

impl Schedule {
    /// Time to wait from `now` until the next run.
    pub fn delay_from(&self, now: NaiveDateTime) -> Duration {
        match *self {
            Self::Every(interval) => interval,
            Self::Daily(at) => {
                let today = now.date().and_time(at);
                let next = if today > now {
                    today
                } else {
                    today + chrono::Duration::days(1)
                };
                (next - now).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

/// Drives a [`Workflow`] on a [`Schedule`] and on demand.
///
/// A run already in progress makes [`Scheduler::run_now`] fail with
/// [`QuillError::RunInProgress`]; the scheduled loop waits for it instead.
/// With a run lock file configured the exclusion also covers other
/// processes: a run held elsewhere refuses `run_now` and skips the
/// scheduled slot.
pub struct Scheduler {
    workflow: Arc<Workflow>,
    guard: Mutex<()>,
    run_lock: Option<PathBuf>,
    schedule: Schedule,
    error_backoff: Duration,
    cancel: CancelSignal,
}

impl Scheduler {
    pub fn new(workflow: Arc<Workflow>, schedule: Schedule) -> Self {
        Self {
            workflow,
            guard: Mutex::new(()),
            run_lock: None,
            schedule,
            error_backoff: Duration::from_secs(3600),
            cancel: CancelSignal::new(),
        }
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    /// Hold an advisory lock on `path` for the duration of every run.
    pub fn with_run_lock(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_lock = Some(path.into());
        self
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn workflow(&self) -> &Arc<Workflow> {
        &self.workflow
    }

    /// Signal shared with every run this scheduler starts.
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Run the workflow immediately unless a run is already in progress.
    pub async fn run_now(&self) -> Result<WorkflowResult> {
        let _running = self
            .guard
            .try_lock()
            .map_err(|_| QuillError::RunInProgress)?;
        let _held = self.hold_run_lock()?;
        self.cancel.check()?;
        Ok(self.workflow.run(&self.cancel).await)
    }

    fn hold_run_lock(&self) -> Result<Option<FileLock>> {
        let Some(path) = &self.run_lock else {
            return Ok(None);
        };
        match FileLock::try_acquire(path)? {
            Some(lock) => Ok(Some(lock)),
            None => Err(QuillError::RunInProgress),
        }
    }

    /// Run on schedule until [`Scheduler::stop`] is called.
    #[instrument(skip(self), fields(schedule = ?self.schedule))]
    pub async fn run_forever(&self) {
        info!("Scheduler started");
        loop {
            let delay = self.schedule.delay_from(Local::now().naive_local());
            info!(delay_secs = delay.as_secs(), "Next workflow run scheduled");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => break,
            }

            let result = {
                let _running = self.guard.lock().await;
                let _held = match self.hold_run_lock() {
                    Ok(lock) => lock,
                    Err(e) => {
                        warn!(error = %e, "Skipping scheduled run");
                        continue;
                    }
                };
                self.workflow.run(&self.cancel).await
            };

            if self.cancel.is_cancelled() {
                break;
            }

            match result.error {
                Some(ref e) if e.kind == "quality_below_threshold" => {
                    warn!(run_id = %result.run_id, "Scheduled run rejected its article");
                }
                Some(ref e) => {
                    error!(
                        run_id = %result.run_id,
                        kind = %e.kind,
                        error = %e.message,
                        backoff_secs = self.error_backoff.as_secs(),
                        "Scheduled run failed, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(self.error_backoff) => {}
                        _ = self.cancel.cancelled() => break,
                    }
                }
                None => info!(run_id = %result.run_id, "Scheduled run completed"),
            }
        }
        info!("Scheduler stopped");
    }

    /// Stop the loop and cancel any in-flight run at its next check.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn daily_waits_until_later_today() {
        let schedule = Schedule::Daily(NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        assert_eq!(schedule.delay_from(at(5, 30)), Duration::from_secs(30 * 60));
    }

    #[test]
    fn daily_rolls_over_to_tomorrow() {
        let schedule = Schedule::Daily(NaiveTime::from_hms_opt(6, 0, 0).unwrap());
        assert_eq!(schedule.delay_from(at(6, 0)), Duration::from_secs(24 * 3600));
        assert_eq!(schedule.delay_from(at(7, 0)), Duration::from_secs(23 * 3600));
    }

    #[test]
    fn interval_is_constant() {
        let schedule = Schedule::Every(Duration::from_secs(900));
        assert_eq!(schedule.delay_from(at(23, 59)), Duration::from_secs(900));
    }
}
