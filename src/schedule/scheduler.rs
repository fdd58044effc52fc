//! # Cron timer tasks.
//!
//! [`Scheduler::schedule`] spawns one timer task per descriptor with a
//! `cron_restart` expression. Each task polls the [`Clock`] every `tick` and
//! hands due instants to a callback; the supervisor's callback only enqueues a
//! restart intent on the command queue.
//!
//! ```text
//! interval(tick) ─► trigger.poll(clock.now())
//!                      ├─ false ─► sleep
//!                      └─ true  ─► on_fire(name)   (exactly once per due tick)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::clock::Clock;
use super::cron::CronExpr;
use super::trigger::CronTrigger;

/// Owner of all cron timer tasks.
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    tick: Duration,
    token: CancellationToken,
}

impl Scheduler {
    /// Creates a scheduler polling `clock` every `tick` (minimum 1ms).
    pub fn new(clock: Arc<dyn Clock>, tick: Duration) -> Self {
        Self {
            clock,
            tick: tick.max(Duration::from_millis(1)),
            token: CancellationToken::new(),
        }
    }

    /// Registers a recurring timer for `name`.
    ///
    /// The trigger is armed against the clock's current reading, so the first
    /// firing is the first matching minute strictly after now.
    pub fn schedule<F>(&self, name: impl Into<Arc<str>>, expr: CronExpr, on_fire: F) -> JoinHandle<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let name: Arc<str> = name.into();
        let clock = Arc::clone(&self.clock);
        let token = self.token.child_token();
        let mut trigger = CronTrigger::new(expr, clock.now());
        let tick = self.tick;

        tracing::debug!(process = %name, cron = %trigger.expr(), next = ?trigger.next_due(), "cron armed");

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if trigger.poll(clock.now()) {
                            tracing::debug!(process = %name, next = ?trigger.next_due(), "cron fired");
                            on_fire(&name);
                        }
                    }
                }
            }
        })
    }

    /// Stops every timer task.
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ManualClock;
    use chrono::{NaiveDate, TimeDelta};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_missed_ticks_fire_once() {
        let t0 = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        let clock = Arc::new(ManualClock::new(t0));
        let scheduler = Scheduler::new(clock.clone(), Duration::from_millis(5));
        let fired = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&fired);
        let _task = scheduler.schedule("dsp", CronExpr::parse("0 * * * *").unwrap(), move |name| {
            assert_eq!(name, "dsp");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // Jump over 10:00, 11:00 and 12:00.
        clock.advance(TimeDelta::hours(3));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        scheduler.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_timers() {
        let clock = Arc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        ));
        let scheduler = Scheduler::new(clock, Duration::from_millis(5));
        let task = scheduler.schedule("snap", CronExpr::parse("@hourly").unwrap(), |_| {});
        scheduler.shutdown();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("timer task exits")
            .expect("timer task does not panic");
    }
}
