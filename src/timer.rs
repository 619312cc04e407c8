use chrono::{DateTime, Local};
use uuid::Uuid;

/// The single board-wide work timer. At most one task runs at a time;
/// the transitions live on the store, which owns the tasks being credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running {
        task_id: Uuid,
        started_at: DateTime<Local>,
    },
}

impl TimerState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn running_task(&self) -> Option<Uuid> {
        match self {
            Self::Running { task_id, .. } => Some(*task_id),
            Self::Idle => None,
        }
    }

    /// Elapsed whole seconds, re-derived from the wall clock on every call
    /// rather than accumulated, so a suspended process stays correct.
    pub fn elapsed_seconds(&self, now: DateTime<Local>) -> u64 {
        match self {
            Self::Running { started_at, .. } => {
                let millis = now.signed_duration_since(*started_at).num_milliseconds();
                if millis <= 0 {
                    0
                } else {
                    (millis / 1000) as u64
                }
            }
            Self::Idle => 0,
        }
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Convert an elapsed session to whole credited minutes, rounding half up
/// (90 seconds credits 2 minutes, 29 seconds credits 0).
pub fn credited_minutes(elapsed_seconds: u64) -> u32 {
    ((elapsed_seconds + 30) / 60) as u32
}
