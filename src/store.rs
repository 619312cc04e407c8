use crate::domain::{Column, Filters, Project, ProjectSelection, Task, TaskKind, TaskSize};
use crate::timer::{credited_minutes, TimerState};
use chrono::{DateTime, Local};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use uuid::Uuid;

/// Validation rejection from a store mutation. Rejected mutations never
/// partially apply.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("task title cannot be empty")]
    EmptyTitle,
    #[error("project name cannot be empty")]
    EmptyName,
    #[error("focus name cannot be empty")]
    EmptyLabel,
    #[error("focus \"{0}\" already exists")]
    DuplicateLabel(String),
    #[error("focus name is unchanged")]
    UnchangedLabel,
    #[error("no such task")]
    UnknownTask,
    #[error("prompt tasks cannot be timed")]
    PromptTaskTimer,
}

/// Everything the board holds: domain entities, selection/filter state and
/// the work timer. Owned exclusively by the [`Store`].
#[derive(Debug, Clone)]
pub struct Board {
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    /// Global focus-area set, in creation order
    pub labels: Vec<String>,
    pub filters: Filters,
    pub timer: TimerState,
    pub left_sidebar_collapsed: bool,
    pub right_sidebar_collapsed: bool,
}

impl Board {
    pub fn new(seed_labels: Vec<String>) -> Self {
        Self {
            projects: Vec::new(),
            tasks: Vec::new(),
            labels: seed_labels,
            filters: Filters::default(),
            timer: TimerState::Idle,
            left_sidebar_collapsed: false,
            right_sidebar_collapsed: false,
        }
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn project(&self, id: Uuid) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// True when the board holds anything worth migrating to a fresh
    /// remote account
    pub fn has_content(&self) -> bool {
        !self.projects.is_empty() || !self.tasks.is_empty()
    }
}

/// Partial update for a project; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
    /// `Some(None)` clears the primary focus area
    pub primary_area: Option<Option<String>>,
}

/// Partial update for a task; `None` fields are left untouched.
/// Size/estimate apply to timed tasks only and prompt text to prompt
/// tasks only; a patch never changes the task's kind.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    /// `Some(None)` unlinks the task from its project
    pub project_id: Option<Option<Uuid>>,
    pub column: Option<Column>,
    pub notes: Option<String>,
    pub labels: Option<Vec<String>>,
    pub size: Option<TaskSize>,
    pub estimate_minutes: Option<u32>,
    pub prompt_text: Option<String>,
}

/// Notified after every store mutation, with the board already in its new
/// state. Local persistence and the sync scheduler are subscribers.
pub trait StoreObserver {
    fn board_changed(&mut self, board: &Board);
}

pub type SharedObserver = Rc<RefCell<dyn StoreObserver>>;

/// The single owner of all board state. Mutations go through the methods
/// below; each one validates, applies, then notifies subscribers exactly
/// once (timer starts that implicitly stop a previous timer notify for
/// both transitions, like two user actions would).
pub struct Store {
    board: Board,
    observers: Vec<SharedObserver>,
}

impl Store {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            observers: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn subscribe(&mut self, observer: SharedObserver) {
        self.observers.push(observer);
    }

    fn notify(&mut self) {
        for observer in &self.observers {
            observer.borrow_mut().board_changed(&self.board);
        }
    }

    // ----- projects -----

    pub fn create_project(
        &mut self,
        name: &str,
        color: Option<&str>,
        notes: &str,
        primary_area: Option<&str>,
    ) -> Result<Project, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let project = Project::new(
            name.to_string(),
            color
                .unwrap_or(crate::domain::DEFAULT_PROJECT_COLOR)
                .to_string(),
            notes.to_string(),
            primary_area.map(str::to_string),
        );
        self.board.projects.push(project.clone());
        self.notify();
        Ok(project)
    }

    /// Shallow last-write-wins merge; no-op when the id is unknown
    pub fn update_project(&mut self, id: Uuid, patch: ProjectPatch) {
        let Some(project) = self.board.projects.iter_mut().find(|p| p.id == id) else {
            return;
        };
        if let Some(name) = patch.name {
            project.name = name;
        }
        if let Some(color) = patch.color {
            project.color = color;
        }
        if let Some(notes) = patch.notes {
            project.notes = notes;
        }
        if let Some(primary_area) = patch.primary_area {
            project.primary_area = primary_area;
        }
        self.notify();
    }

    /// Delete a project. Referencing tasks are unlinked, never deleted;
    /// a selection pointing at the project falls back to all projects.
    pub fn delete_project(&mut self, id: Uuid) {
        self.board.projects.retain(|p| p.id != id);
        for task in &mut self.board.tasks {
            if task.project_id == Some(id) {
                task.project_id = None;
            }
        }
        if self.board.filters.selection == ProjectSelection::Project(id) {
            self.board.filters.selection = ProjectSelection::All;
        }
        self.notify();
    }

    // ----- tasks -----

    /// Create a task. A task linked to a project starts with the project's
    /// primary focus area as its only label.
    pub fn create_task(
        &mut self,
        title: &str,
        project_id: Option<Uuid>,
        column: Column,
        kind: TaskKind,
    ) -> Result<Task, StoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(StoreError::EmptyTitle);
        }

        let inherited = project_id
            .and_then(|id| self.board.project(id))
            .and_then(|p| p.primary_area.clone());

        let mut task = Task::new(title.to_string(), project_id, column, kind);
        if let Some(label) = inherited {
            task.labels = vec![label];
        }

        self.board.tasks.push(task.clone());
        self.notify();
        Ok(task)
    }

    /// Shallow last-write-wins merge; no-op when the id is unknown.
    /// Labels the board has not seen before join the global focus set.
    pub fn update_task(&mut self, id: Uuid, patch: TaskPatch) {
        let Some(task) = self.board.tasks.iter_mut().find(|t| t.id == id) else {
            return;
        };

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(project_id) = patch.project_id {
            task.project_id = project_id;
        }
        if let Some(column) = patch.column {
            task.column = column;
        }
        if let Some(notes) = patch.notes {
            task.notes = notes;
        }

        let mut new_labels = Vec::new();
        if let Some(labels) = patch.labels {
            new_labels = labels.clone();
            task.labels = labels;
        }

        match &mut task.kind {
            TaskKind::Timed(timing) => {
                if let Some(size) = patch.size {
                    timing.size = size;
                }
                if let Some(estimate) = patch.estimate_minutes {
                    timing.estimate_minutes = estimate;
                }
            }
            TaskKind::Prompt { text } => {
                if let Some(prompt) = patch.prompt_text {
                    *text = prompt;
                }
            }
        }

        for label in new_labels {
            if !self.board.labels.contains(&label) {
                self.board.labels.push(label);
            }
        }

        self.notify();
    }

    /// Delete a task, stopping (and crediting) the timer first if it is
    /// running on this task
    pub fn delete_task(&mut self, id: Uuid) {
        self.delete_task_at(id, Local::now());
    }

    pub fn delete_task_at(&mut self, id: Uuid, now: DateTime<Local>) {
        if self.board.timer.running_task() == Some(id) {
            self.stop_timer_at(now);
        }
        self.board.tasks.retain(|t| t.id != id);
        self.notify();
    }

    /// Column transition, from drag-and-drop or the CLI; no-op when unknown
    pub fn move_task(&mut self, id: Uuid, column: Column) {
        let Some(task) = self.board.tasks.iter_mut().find(|t| t.id == id) else {
            return;
        };
        task.column = column;
        self.notify();
    }

    // ----- focus areas -----

    pub fn add_label(&mut self, name: &str) -> Result<(), StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyLabel);
        }
        if self.board.labels.iter().any(|l| l == name) {
            return Err(StoreError::DuplicateLabel(name.to_string()));
        }
        self.board.labels.push(name.to_string());
        self.notify();
        Ok(())
    }

    /// Rename a focus area everywhere it is referenced: the global set,
    /// every task's labels, every project's primary area and the active
    /// label filter, all before a single persistence notification.
    pub fn rename_label(&mut self, old: &str, new: &str) -> Result<(), StoreError> {
        let new = new.trim();
        if new.is_empty() {
            return Err(StoreError::EmptyLabel);
        }
        if new == old {
            return Err(StoreError::UnchangedLabel);
        }
        if self.board.labels.iter().any(|l| l == new) {
            return Err(StoreError::DuplicateLabel(new.to_string()));
        }

        if let Some(entry) = self.board.labels.iter_mut().find(|l| l.as_str() == old) {
            *entry = new.to_string();
        }
        for task in &mut self.board.tasks {
            for label in &mut task.labels {
                if label.as_str() == old {
                    *label = new.to_string();
                }
            }
        }
        for project in &mut self.board.projects {
            if project.primary_area.as_deref() == Some(old) {
                project.primary_area = Some(new.to_string());
            }
        }
        for filter in &mut self.board.filters.labels {
            if filter.as_str() == old {
                *filter = new.to_string();
            }
        }

        self.notify();
        Ok(())
    }

    /// Remove a focus area from the global set, every task, every project
    /// and the active filter. Tasks and projects themselves are untouched.
    pub fn delete_label(&mut self, name: &str) {
        self.board.labels.retain(|l| l != name);
        for task in &mut self.board.tasks {
            task.labels.retain(|l| l != name);
        }
        for project in &mut self.board.projects {
            if project.primary_area.as_deref() == Some(name) {
                project.primary_area = None;
            }
        }
        self.board.filters.labels.retain(|l| l != name);
        self.notify();
    }

    // ----- selection & filters -----

    pub fn select_project(&mut self, selection: ProjectSelection) {
        self.board.filters.selection = selection;
        self.notify();
    }

    pub fn toggle_label_filter(&mut self, label: &str) {
        let filters = &mut self.board.filters.labels;
        if let Some(pos) = filters.iter().position(|l| l == label) {
            filters.remove(pos);
        } else {
            filters.push(label.to_string());
        }
        self.notify();
    }

    pub fn toggle_size_filter(&mut self, size: TaskSize) {
        let filters = &mut self.board.filters.sizes;
        if let Some(pos) = filters.iter().position(|s| *s == size) {
            filters.remove(pos);
        } else {
            filters.push(size);
        }
        self.notify();
    }

    pub fn set_active_only(&mut self, active_only: bool) {
        self.board.filters.active_only = active_only;
        self.notify();
    }

    // ----- timer -----

    /// Start the timer on a task. A running timer is stopped (and its task
    /// credited) first; the new task moves to Now if it isn't there yet.
    pub fn start_timer(&mut self, task_id: Uuid) -> Result<(), StoreError> {
        self.start_timer_at(task_id, Local::now())
    }

    pub fn start_timer_at(&mut self, task_id: Uuid, now: DateTime<Local>) -> Result<(), StoreError> {
        let task = self.board.task(task_id).ok_or(StoreError::UnknownTask)?;
        if task.is_prompt() {
            return Err(StoreError::PromptTaskTimer);
        }

        if !self.board.timer.is_idle() {
            self.stop_timer_at(now);
        }

        self.board.timer = TimerState::Running {
            task_id,
            started_at: now,
        };
        if let Some(task) = self.board.tasks.iter_mut().find(|t| t.id == task_id) {
            if task.column != Column::Doing {
                task.column = Column::Doing;
            }
        }
        self.notify();
        Ok(())
    }

    /// Stop the timer, crediting elapsed wall-clock time (rounded half up
    /// to whole minutes) to the task and logging a time entry — always,
    /// even when the session rounds to zero minutes. No-op when idle.
    pub fn stop_timer(&mut self) {
        self.stop_timer_at(Local::now());
    }

    pub fn stop_timer_at(&mut self, now: DateTime<Local>) {
        let TimerState::Running { task_id, .. } = self.board.timer else {
            return;
        };
        let minutes = credited_minutes(self.board.timer.elapsed_seconds(now));

        if let Some(task) = self.board.tasks.iter_mut().find(|t| t.id == task_id) {
            if let Some(timing) = task.timing_mut() {
                timing.credit(minutes, now);
            }
        }

        self.board.timer = TimerState::Idle;
        self.notify();
    }

    /// Elapsed display seconds for the running timer
    pub fn timer_elapsed_seconds(&self, now: DateTime<Local>) -> u64 {
        self.board.timer.elapsed_seconds(now)
    }

    // ----- remote replacement -----

    /// Replace board content wholesale from a remote snapshot. Observers
    /// are deliberately not notified: a replacement coming in over the
    /// feed must not schedule an echoing push. Callers that need the
    /// result on disk persist it explicitly.
    ///
    /// The timer is local-only; if its task vanished in the replacement
    /// it is reset without crediting anything.
    pub fn replace_from_remote(
        &mut self,
        projects: Vec<Project>,
        tasks: Vec<Task>,
        labels: Vec<String>,
    ) {
        self.board.projects = projects;
        self.board.tasks = tasks;
        self.board.labels = labels;

        if let Some(task_id) = self.board.timer.running_task() {
            if self.board.task(task_id).is_none() {
                self.board.timer = TimerState::Idle;
            }
        }
        if let ProjectSelection::Project(id) = self.board.filters.selection {
            if self.board.project(id).is_none() {
                self.board.filters.selection = ProjectSelection::All;
            }
        }
    }

    /// Direct board access for wiring code (snapshot restore, sidebar
    /// flags). Does not notify.
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }
}
