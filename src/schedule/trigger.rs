//! # Coalescing cron trigger.
//!
//! [`CronTrigger`] remembers the next due instant of one expression and answers
//! "should it fire now?" for successive clock readings.
//!
//! ```text
//! poll(now)
//!   ├─ now <  next_due ─► false          (includes backward jumps: due instant kept)
//!   └─ now >= next_due ─► true, once     next_due = expr.next_after(now)
//! ```
//!
//! A forward jump over several due instants fires exactly once; the missed
//! instants are coalesced. An instant that already fired never fires again,
//! even if the clock is set back before it.

use chrono::NaiveDateTime;

use super::cron::CronExpr;

/// Per-descriptor cron state.
#[derive(Debug, Clone)]
pub struct CronTrigger {
    expr: CronExpr,
    next_due: Option<NaiveDateTime>,
    last_fired: Option<NaiveDateTime>,
}

impl CronTrigger {
    /// Arms the trigger; the first due instant is strictly after `now`.
    pub fn new(expr: CronExpr, now: NaiveDateTime) -> Self {
        let next_due = expr.next_after(now);
        Self {
            expr,
            next_due,
            last_fired: None,
        }
    }

    /// Returns `true` at most once per due instant (see module docs).
    pub fn poll(&mut self, now: NaiveDateTime) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }
        self.last_fired = Some(due);
        self.next_due = self.expr.next_after(now);
        true
    }

    /// Next instant at which [`poll`](Self::poll) will fire, if any.
    pub fn next_due(&self) -> Option<NaiveDateTime> {
        self.next_due
    }

    /// Due instant of the last firing.
    pub fn last_fired(&self) -> Option<NaiveDateTime> {
        self.last_fired
    }

    /// The underlying expression.
    pub fn expr(&self) -> &CronExpr {
        &self.expr
    }
}
