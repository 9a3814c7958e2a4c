use std::fmt;

use crate::error::{SimError, SimResult};
use crate::traits::Timer;

/// A started timer waiting for its fire time.
pub(crate) struct PendingTimer {
    pub fire_time: u64,
    pub seq: u64,
    pub timer: Box<dyn Timer>,
}

impl fmt::Debug for PendingTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTimer")
            .field("fire_time", &self.fire_time)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Fire time of a timer started `delay` ticks after `now`.
pub(crate) fn relative_fire_time(now: u64, delay: i64) -> SimResult<u64> {
    match u64::try_from(delay) {
        Ok(delay) if delay > 0 => Ok(now.saturating_add(delay)),
        _ => Err(SimError::NonPositiveTimerDelay(delay)),
    }
}

/// An absolute fire time must lie strictly after `now`.
pub(crate) fn absolute_fire_time(now: u64, at: u64) -> SimResult<u64> {
    if at <= now {
        return Err(SimError::TimerInPast {
            requested: at,
            current: now,
        });
    }
    Ok(at)
}

/// Remove every timer due at `now`, ordered by fire time and then by start
/// order.
pub(crate) fn take_due(timers: &mut Vec<PendingTimer>, now: u64) -> Vec<PendingTimer> {
    let (mut due, pending): (Vec<_>, Vec<_>) =
        timers.drain(..).partition(|t| t.fire_time <= now);
    *timers = pending;
    due.sort_by_key(|t| (t.fire_time, t.seq));
    due
}
