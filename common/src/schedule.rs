// Next execution time calculation for recurring tasks
//
// A task fires at `start_time + k * repeat_interval` for k = 0, 1, 2, ...
// Missed ticks are never replayed: the next execution is always the first
// tick after "now".

use crate::models::TaskDefinition;
use chrono::{DateTime, Duration, Utc};

/// Inputs of a next-execution calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTiming {
    pub start_time: DateTime<Utc>,
    pub repeat_interval_seconds: u64,
    pub now: DateTime<Utc>,
}

impl TaskTiming {
    pub fn new(start_time: DateTime<Utc>, repeat_interval_seconds: u64, now: DateTime<Utc>) -> Self {
        Self {
            start_time,
            repeat_interval_seconds,
            now,
        }
    }

    pub fn next_execution(&self) -> DateTime<Utc> {
        next_execution(self.start_time, self.repeat_interval_seconds, self.now)
    }
}

/// Calculate the next execution time of a task.
///
/// - A start time in the future is returned as is.
/// - A zero interval marks a one-shot task: the start time is returned even
///   when it lies in the past.
/// - Otherwise the result is the first tick strictly after `now`. When `now`
///   lands exactly on a tick the following tick is returned.
///
/// Arithmetic is done in milliseconds. Results past the representable range
/// saturate to [`DateTime::<Utc>::MAX_UTC`].
pub fn next_execution(
    start_time: DateTime<Utc>,
    repeat_interval_seconds: u64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    if start_time > now {
        return start_time;
    }

    if repeat_interval_seconds == 0 {
        return start_time;
    }

    let Some(interval_ms) = i64::try_from(repeat_interval_seconds)
        .ok()
        .and_then(|seconds| seconds.checked_mul(1000))
    else {
        return DateTime::<Utc>::MAX_UTC;
    };

    // Ticks already passed, counting the one at start_time
    let ticks = (now - start_time).num_milliseconds() / interval_ms + 1;

    ticks
        .checked_mul(interval_ms)
        .and_then(|offset_ms| start_time.checked_add_signed(Duration::milliseconds(offset_ms)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// ScheduleTrigger exposes next-execution calculations on scheduled items
pub trait ScheduleTrigger {
    /// Next time the item should fire, as seen at `now`
    fn next_execution_time(&self, now: DateTime<Utc>) -> DateTime<Utc>;

    /// Whole seconds from `now` until the next execution (negative when overdue)
    fn seconds_until_next_execution(&self, now: DateTime<Utc>) -> i64 {
        (self.next_execution_time(now) - now).num_seconds()
    }

    /// True once a one-shot item has run
    fn is_complete(&self) -> bool;
}

impl ScheduleTrigger for TaskDefinition {
    fn next_execution_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.start_time {
            Some(start_time) => {
                let next = next_execution(start_time, self.repeat_interval, now);
                tracing::debug!(
                    task_name = %self.name,
                    next_execution = %next,
                    "Calculated next execution time"
                );
                next
            }
            // Without a start time the task is due immediately
            None => now,
        }
    }

    fn is_complete(&self) -> bool {
        self.is_one_shot() && self.last_execution_time.is_some()
    }
}
