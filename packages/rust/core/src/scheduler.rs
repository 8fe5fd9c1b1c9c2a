//! Recurring schedule driving one monitor per source.
//!
//! Single-threaded cooperative polling: one control loop, due jobs executed
//! inline and sequentially. Each source gets a daily run time offset from
//! the base time by a fixed stagger so many hosts are never hit in a burst.
//! There is no in-flight cancellation; stopping the process is the only way
//! to stop a cycle, and the next cycle re-evaluates from a clean fetch.

use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use tracing::{info, instrument, warn};

use presswatch_shared::{PressWatchError, Result};

use crate::monitor::{Monitor, SilentObserver};

/// Drives all monitors on a staggered daily cadence.
pub struct Scheduler {
    monitors: Vec<Monitor>,
    base_time: NaiveTime,
    stagger_minutes: u32,
    poll_interval: Duration,
}

struct Job {
    monitor_index: usize,
    next_run: NaiveDateTime,
}

impl Scheduler {
    /// Create a scheduler. `schedule_time` is the first source's daily run
    /// time as `HH:MM` local time.
    pub fn new(
        monitors: Vec<Monitor>,
        schedule_time: &str,
        stagger_minutes: u32,
        poll_interval: Duration,
    ) -> Result<Self> {
        let base_time = NaiveTime::parse_from_str(schedule_time, "%H:%M").map_err(|e| {
            PressWatchError::config(format!("invalid schedule_time '{schedule_time}': {e}"))
        })?;

        Ok(Self {
            monitors,
            base_time,
            stagger_minutes,
            poll_interval,
        })
    }

    /// Run the control loop. Never returns under normal operation; the
    /// process is stopped by termination.
    #[instrument(skip_all, fields(sources = self.monitors.len()))]
    pub async fn run(&self) -> Result<()> {
        info!(
            base_time = %self.base_time,
            stagger_minutes = self.stagger_minutes,
            "starting scheduler"
        );

        // Cold start: surface current state without waiting for the first tick.
        for monitor in &self.monitors {
            self.run_one(monitor).await;
        }

        let mut jobs: Vec<Job> = self
            .monitors
            .iter()
            .enumerate()
            .map(|(i, monitor)| {
                let at = staggered_time(self.base_time, i, self.stagger_minutes);
                let next_run = next_daily_run(Local::now().naive_local(), at);
                info!(source = monitor.source_name(), %next_run, "scheduled");
                Job {
                    monitor_index: i,
                    next_run,
                }
            })
            .collect();

        // Coarse poll, not a tight loop. Due jobs run inline, one source's
        // cycle completing before the next due check happens.
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let now = Local::now().naive_local();
            for job in jobs.iter_mut() {
                if job.next_run <= now {
                    self.run_one(&self.monitors[job.monitor_index]).await;
                    job.next_run += TimeDelta::days(1);
                }
            }
        }
    }

    /// Run one cycle, containing any failure to this source and this tick.
    async fn run_one(&self, monitor: &Monitor) {
        match monitor.run_cycle(&SilentObserver).await {
            Ok(report) => info!(
                source = monitor.source_name(),
                new = report.new_releases.len(),
                "cycle complete"
            ),
            Err(e) => warn!(
                source = monitor.source_name(),
                error = %e,
                "cycle failed, retrying at next scheduled run"
            ),
        }
    }
}

/// Daily run time for the source at `index`: base time plus the stagger,
/// wrapping past midnight.
pub fn staggered_time(base: NaiveTime, index: usize, stagger_minutes: u32) -> NaiveTime {
    base + TimeDelta::minutes(index as i64 * i64::from(stagger_minutes))
}

/// The next occurrence of `at` strictly after `now` (today if still ahead,
/// else tomorrow).
pub fn next_daily_run(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let candidate = now.date().and_time(at);
    if candidate <= now {
        candidate + TimeDelta::days(1)
    } else {
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn dt(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 20)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn stagger_offsets_each_source() {
        let base = t(9, 0);
        assert_eq!(staggered_time(base, 0, 5), t(9, 0));
        assert_eq!(staggered_time(base, 1, 5), t(9, 5));
        assert_eq!(staggered_time(base, 4, 5), t(9, 20));
    }

    #[test]
    fn stagger_wraps_past_midnight() {
        let base = t(23, 55);
        assert_eq!(staggered_time(base, 2, 5), t(0, 5));
    }

    #[test]
    fn next_run_later_today() {
        let next = next_daily_run(dt(8, 30), t(9, 0));
        assert_eq!(next, dt(9, 0));
    }

    #[test]
    fn next_run_rolls_to_tomorrow_when_past() {
        let next = next_daily_run(dt(9, 30), t(9, 0));
        assert_eq!(
            next,
            NaiveDate::from_ymd_opt(2024, 3, 21)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn exactly_due_rolls_forward() {
        // A job firing at its exact scheduled instant reschedules tomorrow,
        // not again today.
        let next = next_daily_run(dt(9, 0), t(9, 0));
        assert_eq!(
            next,
            NaiveDate::from_ymd_opt(2024, 3, 21)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn invalid_schedule_time_is_a_config_error() {
        let result = Scheduler::new(Vec::new(), "quarter past nine", 5, Duration::from_secs(60));
        assert!(result.is_err());
    }
}
