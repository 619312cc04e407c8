use crate::domain::{Column, Project, Task, TaskKind, TaskSize, TimeEntry, Timing};
use crate::store::Board;
use crate::timer::TimerState;
use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

fn default_size_id() -> u32 {
    5
}

fn millis_to_local(millis: i64) -> DateTime<Local> {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Local::now)
}

/// One logged timer session on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntryRecord {
    /// Epoch milliseconds
    pub date: i64,
    #[serde(default)]
    pub minutes: u32,
}

/// Project as persisted. Field names match the documented record shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub primary_area: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

impl From<&Project> for ProjectRecord {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            color: project.color.clone(),
            notes: project.notes.clone(),
            primary_area: project.primary_area.clone(),
            created_at: project.created_at.timestamp_millis(),
        }
    }
}

impl From<ProjectRecord> for Project {
    fn from(record: ProjectRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            color: record.color,
            notes: record.notes,
            primary_area: record.primary_area,
            created_at: millis_to_local(record.created_at),
        }
    }
}

/// Task as persisted: the two task kinds flatten into one record with an
/// `isPromptOnly` marker; loading is best-effort, missing fields default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default = "default_size_id")]
    pub size_id: u32,
    #[serde(default = "default_size_id")]
    pub estimate_minutes: u32,
    #[serde(default)]
    pub actual_minutes: u32,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub ai_prompt: String,
    #[serde(default)]
    pub is_prompt_only: bool,
    pub column_id: Column,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub time_entries: Vec<TimeEntryRecord>,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        let mut record = Self {
            id: task.id,
            title: task.title.clone(),
            project_id: task.project_id,
            size_id: default_size_id(),
            estimate_minutes: default_size_id(),
            actual_minutes: 0,
            labels: task.labels.clone(),
            notes: task.notes.clone(),
            ai_prompt: String::new(),
            is_prompt_only: false,
            column_id: task.column,
            created_at: task.created_at.timestamp_millis(),
            time_entries: Vec::new(),
        };

        match &task.kind {
            TaskKind::Timed(timing) => {
                record.size_id = timing.size.minutes();
                record.estimate_minutes = timing.estimate_minutes;
                record.actual_minutes = timing.actual_minutes;
                record.time_entries = timing
                    .time_entries
                    .iter()
                    .map(|entry| TimeEntryRecord {
                        date: entry.at.timestamp_millis(),
                        minutes: entry.minutes,
                    })
                    .collect();
            }
            TaskKind::Prompt { text } => {
                record.ai_prompt = text.clone();
                record.is_prompt_only = true;
            }
        }

        record
    }
}

impl From<TaskRecord> for Task {
    fn from(record: TaskRecord) -> Self {
        let kind = if record.is_prompt_only {
            TaskKind::Prompt {
                text: record.ai_prompt,
            }
        } else {
            TaskKind::Timed(Timing {
                size: TaskSize::from_minutes(record.size_id).unwrap_or_default(),
                estimate_minutes: record.estimate_minutes,
                actual_minutes: record.actual_minutes,
                time_entries: record
                    .time_entries
                    .into_iter()
                    .map(|entry| TimeEntry {
                        at: millis_to_local(entry.date),
                        minutes: entry.minutes,
                    })
                    .collect(),
            })
        };

        Self {
            id: record.id,
            title: record.title,
            project_id: record.project_id,
            labels: record.labels,
            notes: record.notes,
            column: record.column_id,
            created_at: millis_to_local(record.created_at),
            kind,
        }
    }
}

/// The full local record: board content plus the local-only timer snapshot
/// and sidebar flags. Filters and selection are session state and are not
/// persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub projects: Vec<ProjectRecord>,
    pub tasks: Vec<TaskRecord>,
    /// Missing (as opposed to empty) falls back to the seed labels
    pub all_labels: Option<Vec<String>>,
    pub active_timer_task_id: Option<Uuid>,
    /// Epoch milliseconds
    pub timer_start_time: Option<i64>,
    /// Last displayed elapsed seconds, recomputed at save time
    pub timer_elapsed: u64,
    pub left_sidebar_collapsed: bool,
    pub right_sidebar_collapsed: bool,
}

impl Snapshot {
    pub fn from_board(board: &Board) -> Self {
        let (active_timer_task_id, timer_start_time) = match board.timer {
            TimerState::Running {
                task_id,
                started_at,
            } => (Some(task_id), Some(started_at.timestamp_millis())),
            TimerState::Idle => (None, None),
        };

        Self {
            projects: board.projects.iter().map(ProjectRecord::from).collect(),
            tasks: board.tasks.iter().map(TaskRecord::from).collect(),
            all_labels: Some(board.labels.clone()),
            active_timer_task_id,
            timer_start_time,
            timer_elapsed: board.timer.elapsed_seconds(Local::now()),
            left_sidebar_collapsed: board.left_sidebar_collapsed,
            right_sidebar_collapsed: board.right_sidebar_collapsed,
        }
    }

    /// Rebuild the in-memory board. A running timer survives restarts;
    /// its elapsed time keeps deriving from the stored start instant.
    pub fn into_board(self, seed_labels: &[String]) -> Board {
        let timer = match (self.active_timer_task_id, self.timer_start_time) {
            (Some(task_id), Some(start_millis)) => TimerState::Running {
                task_id,
                started_at: millis_to_local(start_millis),
            },
            _ => TimerState::Idle,
        };

        let mut board = Board::new(self.all_labels.unwrap_or_else(|| seed_labels.to_vec()));
        board.projects = self.projects.into_iter().map(Project::from).collect();
        board.tasks = self.tasks.into_iter().map(Task::from).collect();
        board.timer = timer;
        board.left_sidebar_collapsed = self.left_sidebar_collapsed;
        board.right_sidebar_collapsed = self.right_sidebar_collapsed;
        board
    }
}

/// Load the snapshot. A missing file is a fresh board; a corrupt file is
/// logged and treated the same, never fatal.
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Snapshot {
    let path = path.as_ref();

    let content = match super::files::read_file(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!("failed to read {}: {}", path.display(), err);
            return Snapshot::default();
        }
    };
    if content.is_empty() {
        return Snapshot::default();
    }

    match serde_json::from_str(&content) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::warn!(
                "failed to parse {}, starting from an empty board: {}",
                path.display(),
                err
            );
            Snapshot::default()
        }
    }
}

/// Save the snapshot atomically
pub fn save_snapshot<P: AsRef<Path>>(path: P, snapshot: &Snapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    super::files::atomic_write(path, &json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProjectSelection;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn sample_board() -> Board {
        let mut board = Board::new(vec!["CRM".to_string()]);
        let project = Project::new("Acme".to_string(), "#fff".to_string(), String::new(), None);
        let mut task = Task::new(
            "Write docs".to_string(),
            Some(project.id),
            Column::Ready,
            TaskKind::Timed(Timing::with_size(TaskSize::Fifteen)),
        );
        task.timing_mut().unwrap().credit(12, Local::now());
        let prompt = Task::new(
            "Draft email".to_string(),
            None,
            Column::Backlog,
            TaskKind::Prompt {
                text: "Draft a friendly follow-up".to_string(),
            },
        );
        board.projects.push(project);
        board.tasks.push(task);
        board.tasks.push(prompt);
        board
    }

    #[test]
    fn test_snapshot_round_trip() {
        let board = sample_board();
        let snapshot = Snapshot::from_board(&board);
        let restored = snapshot.into_board(&[]);

        assert_eq!(restored.projects.len(), 1);
        assert_eq!(restored.labels, vec!["CRM".to_string()]);
        assert_eq!(restored.tasks.len(), 2);

        let timed = &restored.tasks[0];
        assert_eq!(timed.title, "Write docs");
        let timing = timed.timing().unwrap();
        assert_eq!(timing.size, TaskSize::Fifteen);
        assert_eq!(timing.actual_minutes, 12);
        assert_eq!(timing.time_entries.len(), 1);

        let prompt = &restored.tasks[1];
        assert_eq!(prompt.prompt_text(), Some("Draft a friendly follow-up"));
    }

    #[test]
    fn test_running_timer_survives_round_trip() {
        let mut board = sample_board();
        let task_id = board.tasks[0].id;
        let started = Local::now() - chrono::Duration::seconds(90);
        board.timer = TimerState::Running {
            task_id,
            started_at: started,
        };

        let restored = Snapshot::from_board(&board).into_board(&[]);
        assert_eq!(restored.timer.running_task(), Some(task_id));
        assert!(restored.timer.elapsed_seconds(Local::now()) >= 90);
    }

    #[test]
    fn test_filters_are_not_persisted() {
        let mut board = sample_board();
        board.filters.active_only = true;
        board.filters.selection = ProjectSelection::Project(board.projects[0].id);

        let restored = Snapshot::from_board(&board).into_board(&[]);
        assert_eq!(restored.filters.active_only, false);
        assert_eq!(restored.filters.selection, ProjectSelection::All);
    }

    #[test]
    fn test_missing_labels_field_falls_back_to_seed() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"projects":[],"tasks":[]}"#).unwrap();
        let board = snapshot.into_board(&["Studio".to_string()]);
        assert_eq!(board.labels, vec!["Studio".to_string()]);
    }

    #[test]
    fn test_task_record_best_effort_defaults() {
        let json = format!(
            r#"{{"id":"{}","title":"bare","columnId":"backlog"}}"#,
            Uuid::new_v4()
        );
        let record: TaskRecord = serde_json::from_str(&json).unwrap();
        let task = Task::from(record);
        assert!(!task.is_prompt());
        let timing = task.timing().unwrap();
        assert_eq!(timing.size, TaskSize::Five);
        assert_eq!(timing.estimate_minutes, 5);
        assert_eq!(timing.actual_minutes, 0);
    }

    #[test]
    fn test_load_missing_and_corrupt_files_fall_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("board.json");

        let snapshot = load_snapshot(&path);
        assert!(snapshot.projects.is_empty());

        std::fs::write(&path, "{not json").unwrap();
        let snapshot = load_snapshot(&path);
        assert!(snapshot.tasks.is_empty());
    }

    #[test]
    fn test_save_and_load_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("board.json");

        let board = sample_board();
        save_snapshot(&path, &Snapshot::from_board(&board)).unwrap();

        let restored = load_snapshot(&path).into_board(&[]);
        assert_eq!(restored.tasks.len(), 2);
        assert_eq!(restored.projects[0].name, "Acme");
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let board = sample_board();
        let json = serde_json::to_value(Snapshot::from_board(&board)).unwrap();
        assert!(json.get("allLabels").is_some());
        assert!(json.get("activeTimerTaskId").is_some());
        assert!(json.get("leftSidebarCollapsed").is_some());
        let task = &json["tasks"][0];
        assert!(task.get("columnId").is_some());
        assert!(task.get("isPromptOnly").is_some());
        assert!(task.get("timeEntries").is_some());
    }
}
