use super::enums::{Column, TaskSize};
use chrono::{DateTime, Local};
use uuid::Uuid;

/// One completed timer session logged against a task
#[derive(Debug, Clone, PartialEq)]
pub struct TimeEntry {
    /// When the session was stopped
    pub at: DateTime<Local>,
    /// Whole minutes credited for the session
    pub minutes: u32,
}

/// Time tracking state of a timed task
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    /// Size bucket, doubles as the default estimate
    pub size: TaskSize,
    /// Estimated minutes to completion
    pub estimate_minutes: u32,
    /// Total minutes logged, only ever grows
    pub actual_minutes: u32,
    /// Append-only log of completed timer sessions
    pub time_entries: Vec<TimeEntry>,
}

impl Timing {
    pub fn with_size(size: TaskSize) -> Self {
        Self {
            size,
            estimate_minutes: size.minutes(),
            actual_minutes: 0,
            time_entries: Vec::new(),
        }
    }

    /// Credit a completed timer session: grow the accumulator and append a
    /// log entry. An entry is appended even for zero credited minutes.
    pub fn credit(&mut self, minutes: u32, at: DateTime<Local>) {
        self.actual_minutes += minutes;
        self.time_entries.push(TimeEntry { at, minutes });
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::with_size(TaskSize::default())
    }
}

/// The two kinds of task: timed work items, and prompt items that carry a
/// text payload instead of being worked against the clock
#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    Timed(Timing),
    Prompt { text: String },
}

/// A task card on the board
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique ID for internal references
    pub id: Uuid,
    /// Task title
    pub title: String,
    /// Owning project, if any
    pub project_id: Option<Uuid>,
    /// Focus area labels, in attach order
    pub labels: Vec<String>,
    /// Multi-line notes
    pub notes: String,
    /// Workflow stage
    pub column: Column,
    /// When the task was created
    pub created_at: DateTime<Local>,
    /// Timed vs prompt payload
    pub kind: TaskKind,
}

impl Task {
    pub fn new(title: String, project_id: Option<Uuid>, column: Column, kind: TaskKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            project_id,
            labels: Vec::new(),
            notes: String::new(),
            column,
            created_at: Local::now(),
            kind,
        }
    }

    pub fn is_prompt(&self) -> bool {
        matches!(self.kind, TaskKind::Prompt { .. })
    }

    /// Timing state, None for prompt tasks
    pub fn timing(&self) -> Option<&Timing> {
        match &self.kind {
            TaskKind::Timed(timing) => Some(timing),
            TaskKind::Prompt { .. } => None,
        }
    }

    pub fn timing_mut(&mut self) -> Option<&mut Timing> {
        match &mut self.kind {
            TaskKind::Timed(timing) => Some(timing),
            TaskKind::Prompt { .. } => None,
        }
    }

    /// Prompt payload, None for timed tasks
    pub fn prompt_text(&self) -> Option<&str> {
        match &self.kind {
            TaskKind::Prompt { text } => Some(text),
            TaskKind::Timed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_timing_defaults() {
        let timing = Timing::default();
        assert_eq!(timing.size, TaskSize::Five);
        assert_eq!(timing.estimate_minutes, 5);
        assert_eq!(timing.actual_minutes, 0);
        assert!(timing.time_entries.is_empty());
    }

    #[test]
    fn test_timing_credit_appends_entry() {
        let mut timing = Timing::with_size(TaskSize::Fifteen);
        let at = Local::now();
        timing.credit(12, at);
        assert_eq!(timing.actual_minutes, 12);
        assert_eq!(timing.time_entries.len(), 1);
        assert_eq!(timing.time_entries[0].minutes, 12);

        // Zero-minute sessions are still logged
        timing.credit(0, at + Duration::minutes(1));
        assert_eq!(timing.actual_minutes, 12);
        assert_eq!(timing.time_entries.len(), 2);
    }

    #[test]
    fn test_task_kind_accessors() {
        let timed = Task::new(
            "Write docs".to_string(),
            None,
            Column::Backlog,
            TaskKind::Timed(Timing::default()),
        );
        assert!(!timed.is_prompt());
        assert!(timed.timing().is_some());
        assert!(timed.prompt_text().is_none());

        let prompt = Task::new(
            "Summarize meeting".to_string(),
            None,
            Column::Ready,
            TaskKind::Prompt {
                text: "Summarize the meeting notes below".to_string(),
            },
        );
        assert!(prompt.is_prompt());
        assert!(prompt.timing().is_none());
        assert_eq!(prompt.prompt_text(), Some("Summarize the meeting notes below"));
    }
}
