use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::app::TaskBell;
use crate::store::KeyValueStore;
use crate::task::{Status, Task};

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(15_000);
pub const DEFAULT_GRACE: Duration = Duration::from_millis(120_000);

const MINUTE_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    /// How late after the ideal instant a reminder may still fire.
    pub grace: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
        }
    }
}

impl ReminderPolicy {
    /// Instant the reminder for `task` should fire, if it is armed at all.
    pub fn remind_at(&self, task: &Task) -> Option<i64> {
        if task.status() == Status::Done || task.reminder_min == 0 || task.reminded_at.is_some() {
            return None;
        }
        let due = task.due_at()?;
        Some(due.timestamp_millis() - i64::from(task.reminder_min) * MINUTE_MS)
    }

    /// Closed window `[remind_at, remind_at + grace]`. A scan that misses the
    /// whole window never fires for that due instant.
    pub fn should_fire(&self, task: &Task, now: DateTime<Utc>) -> bool {
        let Some(remind_at) = self.remind_at(task) else {
            return false;
        };
        let grace_ms = i64::try_from(self.grace.as_millis()).unwrap_or(i64::MAX);
        let now_ms = now.timestamp_millis();
        now_ms >= remind_at && now_ms <= remind_at.saturating_add(grace_ms)
    }
}

/// Positions of the tasks whose reminder is due at `now`, in collection
/// order. Positions rather than ids, since stored ids may be blank or repeated.
pub fn due_reminders(tasks: &[Task], now: DateTime<Utc>, policy: &ReminderPolicy) -> Vec<usize> {
    let due: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| policy.should_fire(task, now))
        .map(|(idx, _)| idx)
        .collect();
    trace!(scanned = tasks.len(), due = due.len(), "computed due reminders");
    due
}

pub type SharedTaskBell<S> = Arc<Mutex<TaskBell<S>>>;

/// Periodic reminder scan on the tokio runtime. The first scan runs
/// immediately.
#[derive(Debug)]
pub struct ReminderDriver {
    handle: Option<JoinHandle<()>>,
}

impl ReminderDriver {
    pub fn start<S>(shared: SharedTaskBell<S>, interval: Duration) -> Self
    where
        S: KeyValueStore + Send + 'static,
    {
        info!(interval_ms = interval.as_millis() as u64, "starting reminder driver");

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let result = shared.lock().scan_reminders(Utc::now());
                match result {
                    Ok(fired) if !fired.is_empty() => {
                        debug!(count = fired.len(), "reminders fired");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %format!("{err:#}"), "reminder scan failed");
                    }
                }
            }
        });

        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("stopped reminder driver");
        }
    }
}

impl Drop for ReminderDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
