use crate::config::Settings;
use crate::domain::{
    filtered_tasks, format_clock, format_minutes, project_stats, today_stats, Column, Task,
};
use crate::import::{import_tasks, ImportReport};
use crate::notices::Notices;
use crate::persistence::{board_file, load_snapshot, save_snapshot, session_file, Snapshot};
use crate::store::{Board, Store, StoreError, StoreObserver};
use crate::sync::{
    clear_session, load_session, save_session, AuthClient, BoardPayload, HttpRowStore,
    SigninOutcome, SyncCoordinator,
};
use crate::ticker;
use anyhow::{bail, Context, Result};
use chrono::Local;
use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

/// Store subscriber that writes the local snapshot after every mutation.
/// Persistence failures are logged, never fatal to the mutation itself.
struct LocalAutosave {
    path: PathBuf,
}

impl StoreObserver for LocalAutosave {
    fn board_changed(&mut self, board: &Board) {
        let snapshot = Snapshot::from_board(board);
        if let Err(err) = save_snapshot(&self.path, &snapshot) {
            warn!("failed to persist board: {err:#}");
        }
    }
}

/// The assembled application: the store with its persistence subscriber,
/// the sync coordinator, and the operations the CLI invokes.
pub struct App {
    pub store: Store,
    pub notices: Rc<RefCell<Notices>>,
    sync: Rc<RefCell<SyncCoordinator>>,
    auth: Option<AuthClient>,
    board_path: PathBuf,
    session_path: PathBuf,
}

impl App {
    pub fn new(settings: Settings) -> Result<Self> {
        let board_path = board_file()?;
        let session_path = session_file()?;
        Self::with_paths(settings, board_path, session_path)
    }

    pub fn with_paths(
        settings: Settings,
        board_path: PathBuf,
        session_path: PathBuf,
    ) -> Result<Self> {
        let board = load_snapshot(&board_path).into_board(&settings.seed_labels);
        let mut store = Store::new(board);

        store.subscribe(Rc::new(RefCell::new(LocalAutosave {
            path: board_path.clone(),
        })));

        let session = if settings.remote.is_configured() {
            load_session(&session_path)
        } else {
            None
        };

        let row_store = HttpRowStore::new(&settings.remote.url, &settings.remote.anon_key);
        let sync = Rc::new(RefCell::new(SyncCoordinator::new(
            Box::new(row_store),
            session,
            Duration::from_millis(settings.sync_debounce_ms),
        )));
        store.subscribe(sync.clone());

        let auth = settings
            .remote
            .is_configured()
            .then(|| AuthClient::new(&settings.remote.url, &settings.remote.anon_key));

        Ok(Self {
            store,
            notices: Rc::new(RefCell::new(Notices::default())),
            sync,
            auth,
            board_path,
            session_path,
        })
    }

    /// Flush any debounced remote write before the process exits
    pub fn finish(&mut self) {
        let result = self.sync.borrow_mut().flush();
        if let Err(err) = result {
            warn!("sync flush failed: {err}");
            self.notices.borrow_mut().error("Failed to sync to cloud");
        }
    }

    // ----- lookup -----

    /// Resolve a task from an id (or id prefix), falling back to a
    /// case-insensitive title substring match
    pub fn resolve_task(&self, needle: &str) -> Result<Uuid> {
        let lowered = needle.to_lowercase();
        let tasks = &self.store.board().tasks;

        let mut matches: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.id.to_string().starts_with(&lowered))
            .collect();
        if matches.is_empty() {
            matches = tasks
                .iter()
                .filter(|t| t.title.to_lowercase().contains(&lowered))
                .collect();
        }

        match matches.len() {
            0 => bail!("no task matches \"{needle}\""),
            1 => Ok(matches[0].id),
            n => bail!("\"{needle}\" is ambiguous ({n} tasks match)"),
        }
    }

    /// Resolve a project from an id (or id prefix) or name
    pub fn resolve_project(&self, needle: &str) -> Result<Uuid> {
        let lowered = needle.to_lowercase();
        let projects = &self.store.board().projects;

        let mut matches: Vec<_> = projects
            .iter()
            .filter(|p| p.id.to_string().starts_with(&lowered))
            .collect();
        if matches.is_empty() {
            matches = projects
                .iter()
                .filter(|p| p.name.to_lowercase().contains(&lowered))
                .collect();
        }

        match matches.len() {
            0 => bail!("no project matches \"{needle}\""),
            1 => Ok(matches[0].id),
            n => bail!("\"{needle}\" is ambiguous ({n} projects match)"),
        }
    }

    // ----- timer operations -----

    pub fn start_timer(&mut self, needle: &str) -> Result<()> {
        let id = self.resolve_task(needle)?;
        match self.store.start_timer(id) {
            Ok(()) => {
                let title = self.store.board().task(id).map(|t| t.title.clone());
                println!("Timer started on {}", title.unwrap_or_default());
            }
            Err(StoreError::PromptTaskTimer) => {
                self.notices
                    .borrow_mut()
                    .error("Cannot start timer on prompt-only tasks");
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    pub fn stop_timer(&mut self) {
        let board = self.store.board();
        let Some(task_id) = board.timer.running_task() else {
            println!("No timer running");
            return;
        };
        let title = board.task(task_id).map(|t| t.title.clone()).unwrap_or_default();

        self.store.stop_timer();

        let logged = self
            .store
            .board()
            .task(task_id)
            .and_then(|t| t.timing())
            .and_then(|timing| timing.time_entries.last())
            .map(|entry| entry.minutes)
            .unwrap_or(0);
        println!("Logged {} on {}", format_minutes(logged), title);
    }

    pub fn render_timer(&self) -> String {
        let board = self.store.board();
        match board.timer.running_task().and_then(|id| board.task(id)) {
            Some(task) => {
                let elapsed = self.store.timer_elapsed_seconds(Local::now());
                format!("{}  {}", format_clock(elapsed), task.title)
            }
            None => "No timer running".to_string(),
        }
    }

    /// Live elapsed display on the timer tick cadence, until the user
    /// interrupts (or immediately when idle)
    pub fn follow_timer(&self) -> Result<()> {
        loop {
            print!("\r{}        ", self.render_timer());
            std::io::stdout().flush()?;
            if self.store.board().timer.is_idle() {
                println!();
                return Ok(());
            }
            std::thread::sleep(ticker::tick_duration());
        }
    }

    // ----- import -----

    pub fn import_csv(&mut self, path: &Path, project: Option<&str>) -> Result<ImportReport> {
        let project_id = project.map(|p| self.resolve_project(p)).transpose()?;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let report = import_tasks(&mut self.store, &text, project_id)?;
        Ok(report)
    }

    // ----- rendering -----

    pub fn render_board(&self) -> String {
        let board = self.store.board();
        let tasks = filtered_tasks(&board.tasks, &board.filters);

        let heading = match board.filters.selection {
            crate::domain::ProjectSelection::All => "All Projects".to_string(),
            crate::domain::ProjectSelection::Project(id) => board
                .project(id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "All Projects".to_string()),
        };

        let mut out = format!("# {heading}\n\n");
        for column in Column::all() {
            let column_tasks: Vec<_> =
                tasks.iter().filter(|t| t.column == *column).collect();
            out.push_str(&format!(
                "{} ({})\n",
                column.display_name(),
                column_tasks.len()
            ));
            for task in column_tasks {
                out.push_str(&self.task_line(task));
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    fn task_line(&self, task: &Task) -> String {
        let board = self.store.board();
        let marker = if board.timer.running_task() == Some(task.id) {
            "▶"
        } else {
            " "
        };
        let short_id = task.id.simple().to_string()[..8].to_string();

        let mut line = format!("  {marker} {short_id}  {}", task.title);

        match task.timing() {
            Some(timing) => {
                line.push_str(&format!("  [{}m]", timing.size.minutes()));
                if timing.actual_minutes > 0 {
                    line.push_str(&format!("  {} logged", format_minutes(timing.actual_minutes)));
                }
            }
            None => line.push_str("  [prompt]"),
        }

        for label in &task.labels {
            line.push_str(&format!("  #{label}"));
        }

        if let Some(project) = task.project_id.and_then(|id| board.project(id)) {
            line.push_str(&format!("  ({})", project.name));
        }

        line
    }

    pub fn render_task(&self, needle: &str) -> Result<String> {
        let id = self.resolve_task(needle)?;
        let board = self.store.board();
        let task = board.task(id).context("task vanished")?;

        let mut out = format!("{}\n", task.title);
        out.push_str(&format!("  id:      {}\n", task.id));
        out.push_str(&format!("  column:  {}\n", task.column.display_name()));
        if let Some(project) = task.project_id.and_then(|pid| board.project(pid)) {
            out.push_str(&format!("  project: {}\n", project.name));
        }
        if !task.labels.is_empty() {
            out.push_str(&format!("  focus:   {}\n", task.labels.join(", ")));
        }
        match &task.kind {
            crate::domain::TaskKind::Timed(timing) => {
                out.push_str(&format!(
                    "  size:    {}m  ·  estimate {}  ·  logged {}\n",
                    timing.size.minutes(),
                    format_minutes(timing.estimate_minutes),
                    format_minutes(timing.actual_minutes)
                ));
                if !timing.time_entries.is_empty() {
                    out.push_str(&format!("  sessions: {}\n", timing.time_entries.len()));
                }
            }
            crate::domain::TaskKind::Prompt { text } => {
                out.push_str("  prompt task\n");
                if !text.is_empty() {
                    out.push_str(&format!("\n{text}\n"));
                }
            }
        }
        if !task.notes.is_empty() {
            out.push_str(&format!("\n{}\n", task.notes));
        }
        Ok(out)
    }

    pub fn render_projects(&self) -> String {
        let board = self.store.board();
        if board.projects.is_empty() {
            return "No projects yet\n".to_string();
        }

        let mut out = String::new();
        for project in &board.projects {
            let stats = project_stats(&board.tasks, project.id);
            let area = project
                .primary_area
                .as_deref()
                .map(|a| format!("  #{a}"))
                .unwrap_or_default();
            out.push_str(&format!(
                "{}  {}{}\n    Est: {} · Actual: {}\n",
                &project.id.simple().to_string()[..8],
                project.name,
                area,
                format_minutes(stats.total_estimate),
                format_minutes(stats.total_actual)
            ));
        }
        out
    }

    pub fn render_stats(&self, project: Option<&str>) -> Result<String> {
        let board = self.store.board();
        let stats = today_stats(&board.tasks, &board.projects, Local::now().date_naive());

        let mut out = String::from("Today\n");
        out.push_str(&format!("  Logged: {}\n", format_minutes(stats.total_minutes)));

        if stats.estimate_minutes > 0 && stats.total_minutes > 0 {
            let diff = (stats.total_minutes as f64 - stats.estimate_minutes as f64)
                / stats.estimate_minutes as f64
                * 100.0;
            let sign = if diff > 0.0 { "+" } else { "" };
            out.push_str(&format!("  Estimate vs actual: {sign}{diff:.0}%\n"));
        }

        if !stats.by_label.is_empty() {
            out.push_str("  By focus:\n");
            let mut by_label = stats.by_label.clone();
            by_label.sort_by(|a, b| b.1.cmp(&a.1));
            for (label, minutes) in by_label {
                out.push_str(&format!("    {:<16} {}\n", label, format_minutes(minutes)));
            }
        }

        if !stats.by_project.is_empty() {
            out.push_str("  By project:\n");
            let mut by_project = stats.by_project.clone();
            by_project.sort_by(|a, b| b.1.cmp(&a.1));
            for (name, minutes) in by_project {
                out.push_str(&format!("    {:<16} {}\n", name, format_minutes(minutes)));
            }
        }

        if let Some(needle) = project {
            let id = self.resolve_project(needle)?;
            let project = board.project(id).context("project vanished")?;
            let totals = project_stats(&board.tasks, id);
            out.push_str(&format!(
                "\n{}\n  Estimated: {}\n  Actual:    {}\n",
                project.name,
                format_minutes(totals.total_estimate),
                format_minutes(totals.total_actual)
            ));
        }

        Ok(out)
    }

    // ----- sync -----

    fn auth(&self) -> Result<&AuthClient> {
        self.auth.as_ref().context(
            "remote sync is not configured; set [remote] url and anon_key in settings.toml",
        )
    }

    pub fn sign_up(&mut self, email: &str, password: &str) -> Result<()> {
        self.auth()?.sign_up(email, password)?;
        self.notices
            .borrow_mut()
            .info("Check your email to confirm your account");
        Ok(())
    }

    pub fn sign_in(&mut self, email: &str, password: &str) -> Result<()> {
        let session = self.auth()?.sign_in(email, password)?;
        save_session(&self.session_path, &session)?;
        self.sync.borrow_mut().set_session(session);

        let outcome = self.sync.borrow_mut().handle_signin(self.store.board())?;
        match outcome {
            SigninOutcome::Loaded(payload) => {
                self.apply_remote(payload, true);
            }
            SigninOutcome::MigratedLocal => {
                self.notices.borrow_mut().info("Local data migrated to cloud");
            }
            SigninOutcome::Fresh => {}
        }

        self.notices.borrow_mut().info(format!("Signed in as {email}"));
        Ok(())
    }

    pub fn sign_out(&mut self) -> Result<()> {
        let Some(session) = self.sync.borrow().session().cloned() else {
            println!("Not signed in");
            return Ok(());
        };

        // Push anything still pending under the old identity, best effort
        if let Err(err) = self.sync.borrow_mut().flush() {
            warn!("flush before sign-out failed: {err}");
        }

        self.auth()?.sign_out(&session)?;
        clear_session(&self.session_path)?;
        self.sync.borrow_mut().sign_out();
        self.notices.borrow_mut().info("Signed out");
        Ok(())
    }

    /// Force a push of the current board, regardless of the debounce window
    pub fn push(&mut self) -> Result<()> {
        self.sync
            .borrow_mut()
            .note_change_at(self.store.board(), Instant::now());
        if self.sync.borrow_mut().flush()? {
            self.notices.borrow_mut().info("Pushed board to cloud");
        } else {
            println!("Not signed in");
        }
        Ok(())
    }

    /// Poll the change feed once; true when a foreign write replaced the
    /// board
    pub fn pull(&mut self) -> Result<bool> {
        let payload = self.sync.borrow_mut().poll_feed()?;
        match payload {
            Some(payload) => {
                self.apply_remote(payload, false);
                self.notices.borrow_mut().info("Synced from another device");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Poll the change feed on a fixed cadence until interrupted
    pub fn watch(&mut self) -> Result<()> {
        println!("Watching for changes from other devices (Ctrl+C to stop)");
        loop {
            std::thread::sleep(ticker::feed_poll_duration());

            if let Err(err) = self.sync.borrow_mut().tick() {
                warn!("debounced push failed: {err}");
                self.notices.borrow_mut().error("Failed to sync to cloud");
            }
            if let Err(err) = self.pull() {
                warn!("change-feed poll failed: {err}");
            }

            for notice in self.notices.borrow_mut().drain() {
                println!("{}", notice.message);
            }
        }
    }

    pub fn sync_status(&self) -> String {
        let sync = self.sync.borrow();
        match sync.session() {
            Some(session) if sync.has_pending() => {
                format!("Signed in as {} (changes pending)", session.email)
            }
            Some(session) => format!("Signed in as {}", session.email),
            None if self.auth.is_some() => "Signed out".to_string(),
            None => "Remote sync not configured".to_string(),
        }
    }

    /// Replace the board with a remote snapshot (signin load or feed
    /// event). The result is persisted locally right away, but never
    /// scheduled for a remote push - that would echo the write back.
    fn apply_remote(&mut self, payload: BoardPayload, include_sidebars: bool) {
        let left = payload.left_sidebar_collapsed;
        let right = payload.right_sidebar_collapsed;
        let (projects, tasks, labels) = payload.into_domain();

        self.store.replace_from_remote(projects, tasks, labels);
        if include_sidebars {
            self.store.board_mut().left_sidebar_collapsed = left;
            self.store.board_mut().right_sidebar_collapsed = right;
        }
        self.save_local();
    }

    fn save_local(&self) {
        let snapshot = Snapshot::from_board(self.store.board());
        if let Err(err) = save_snapshot(&self.board_path, &snapshot) {
            warn!("failed to persist board: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskKind;
    use tempfile::tempdir;

    fn test_app(dir: &Path) -> App {
        App::with_paths(
            Settings::default(),
            dir.join("board.json"),
            dir.join("session.json"),
        )
        .unwrap()
    }

    #[test]
    fn test_mutations_autosave_to_disk() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.store
            .create_task("Write docs", None, Column::Backlog, TaskKind::Timed(Default::default()))
            .unwrap();

        let reloaded = test_app(dir.path());
        assert_eq!(reloaded.store.board().tasks.len(), 1);
        assert_eq!(reloaded.store.board().tasks[0].title, "Write docs");
    }

    #[test]
    fn test_seed_labels_on_fresh_board() {
        let dir = tempdir().unwrap();
        let app = test_app(dir.path());
        assert_eq!(app.store.board().labels, Settings::default().seed_labels);
    }

    #[test]
    fn test_resolve_task_by_prefix_title_and_ambiguity() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        let a = app
            .store
            .create_task("Write docs", None, Column::Backlog, TaskKind::Timed(Default::default()))
            .unwrap();
        app.store
            .create_task("Write tests", None, Column::Backlog, TaskKind::Timed(Default::default()))
            .unwrap();

        let prefix = &a.id.to_string()[..8];
        assert_eq!(app.resolve_task(prefix).unwrap(), a.id);
        assert_eq!(app.resolve_task("docs").unwrap(), a.id);
        assert!(app.resolve_task("write").is_err());
        assert!(app.resolve_task("nothing here").is_err());
    }

    #[test]
    fn test_render_board_groups_by_column() {
        let dir = tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.store
            .create_task("Ship it", None, Column::Doing, TaskKind::Timed(Default::default()))
            .unwrap();

        let rendered = app.render_board();
        assert!(rendered.contains("Now (1)"));
        assert!(rendered.contains("Ship it"));
        assert!(rendered.contains("Later (0)"));
    }

    #[test]
    fn test_sync_status_unconfigured() {
        let dir = tempdir().unwrap();
        let app = test_app(dir.path());
        assert_eq!(app.sync_status(), "Remote sync not configured");
        // And sign-in refuses with a pointer at the settings file
        let mut app = app;
        assert!(app.sign_in("me@example.com", "pw").is_err());
    }
}
