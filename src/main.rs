mod app;
mod config;
mod domain;
mod import;
mod notices;
mod persistence;
mod store;
mod sync;
mod ticker;
mod timer;

use anyhow::{bail, Context, Result};
use app::App;
use clap::{Parser, Subcommand};
use config::Settings;
use domain::{Column, ProjectSelection, TaskKind, TaskSize, Timing};
use notices::NoticeKind;
use std::path::PathBuf;
use store::{ProjectPatch, TaskPatch};

#[derive(Parser)]
#[command(name = "tempo")]
#[command(about = "A personal kanban board with a work timer and daily stats", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the board, optionally filtered
    Board {
        /// Scope to a project (name or id), or "all"
        #[arg(short, long)]
        project: Option<String>,
        /// Focus areas to filter by (repeatable)
        #[arg(short, long)]
        focus: Vec<String>,
        /// Sizes to filter by, in minutes (repeatable)
        #[arg(short, long)]
        size: Vec<u32>,
        /// Hide Done tasks
        #[arg(long)]
        active_only: bool,
    },
    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommands),
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommands),
    /// Manage focus areas
    #[command(subcommand)]
    Focus(FocusCommands),
    /// Start the work timer on a task
    Start {
        /// Task id (or prefix) or title fragment
        task: String,
    },
    /// Stop the running timer and log the session
    Stop,
    /// Show the running timer
    Timer {
        /// Keep the elapsed display ticking
        #[arg(long)]
        follow: bool,
    },
    /// Import tasks from a CSV file (Title,Focus,Size,Column with optional Type)
    Import {
        file: PathBuf,
        /// Project to attach imported tasks to
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Today's time stats
    Stats {
        /// Also show lifetime totals for this project
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Cloud sync and account
    #[command(subcommand)]
    Sync(SyncCommands),
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task
    Add {
        title: String,
        #[arg(short, long)]
        project: Option<String>,
        /// Column: later, next, now or done
        #[arg(short, long)]
        column: Option<String>,
        /// Size in minutes: 1, 5, 15 or 30
        #[arg(short, long)]
        size: Option<u32>,
        /// Create a prompt task carrying this text instead of a timed task
        #[arg(long)]
        prompt: Option<String>,
        /// Focus areas to attach (repeatable)
        #[arg(short, long)]
        focus: Vec<String>,
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Edit a task
    Edit {
        task: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        project: Option<String>,
        /// Unlink the task from its project
        #[arg(long)]
        no_project: bool,
        #[arg(long)]
        column: Option<String>,
        #[arg(long)]
        size: Option<u32>,
        /// Estimate in minutes
        #[arg(long)]
        estimate: Option<u32>,
        /// Prompt text (prompt tasks only)
        #[arg(long)]
        prompt: Option<String>,
        /// Replace the focus areas (repeatable)
        #[arg(long)]
        focus: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Move a task to a column
    Move { task: String, column: String },
    /// Show a task, including its prompt text
    Show { task: String },
    /// Delete a task
    Rm { task: String },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Add a project
    Add {
        name: String,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Primary focus area, inherited by new tasks
        #[arg(long)]
        focus: Option<String>,
    },
    /// Edit a project
    Edit {
        project: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Primary focus area
        #[arg(long)]
        focus: Option<String>,
        /// Clear the primary focus area
        #[arg(long)]
        no_focus: bool,
    },
    /// List projects with their time totals
    List,
    /// Delete a project; its tasks are unlinked, not deleted
    Rm { project: String },
}

#[derive(Subcommand)]
enum FocusCommands {
    /// Add a focus area
    Add { name: String },
    /// Rename a focus area everywhere it is used
    Rename { old: String, new: String },
    /// Delete a focus area; tasks and projects are kept
    Rm { name: String },
    /// List focus areas
    List,
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Create an account
    Signup { email: String, password: String },
    /// Sign in and load the cloud board
    Login { email: String, password: String },
    /// Sign out; later changes stay local
    Logout,
    /// Show the sync state
    Status,
    /// Push the current board now
    Push,
    /// Fetch changes from other devices once
    Pull,
    /// Keep pulling changes until interrupted
    Watch,
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("TEMPO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_column(text: &str) -> Result<Column> {
    Column::from_import_word(text)
        .or_else(|| Column::from_key(text))
        .with_context(|| format!("unknown column \"{text}\" (use later, next, now or done)"))
}

fn parse_size(minutes: u32) -> Result<TaskSize> {
    TaskSize::from_minutes(minutes).with_context(|| {
        let options: Vec<String> = TaskSize::all()
            .iter()
            .map(|size| size.minutes().to_string())
            .collect();
        format!("size must be one of {}", options.join(", "))
    })
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let settings = Settings::load();
    let mut app = App::new(settings)?;

    let result = run(&mut app, cli.command);

    // Whatever happened, don't leave a debounced write behind
    app.finish();

    for notice in app.notices.borrow_mut().drain() {
        match notice.kind {
            NoticeKind::Info => println!("{}", notice.message),
            NoticeKind::Error => eprintln!("error: {}", notice.message),
        }
    }

    result
}

fn run(app: &mut App, command: Option<Commands>) -> Result<()> {
    match command {
        None => {
            print!("{}", app.render_board());
        }
        Some(Commands::Board {
            project,
            focus,
            size,
            active_only,
        }) => {
            if let Some(needle) = project {
                if !needle.eq_ignore_ascii_case("all") {
                    let id = app.resolve_project(&needle)?;
                    app.store.select_project(ProjectSelection::Project(id));
                }
            }
            for label in focus {
                app.store.toggle_label_filter(&label);
            }
            for minutes in size {
                app.store.toggle_size_filter(parse_size(minutes)?);
            }
            if active_only {
                app.store.set_active_only(true);
            }
            print!("{}", app.render_board());
        }
        Some(Commands::Task(command)) => run_task(app, command)?,
        Some(Commands::Project(command)) => run_project(app, command)?,
        Some(Commands::Focus(command)) => run_focus(app, command)?,
        Some(Commands::Start { task }) => app.start_timer(&task)?,
        Some(Commands::Stop) => app.stop_timer(),
        Some(Commands::Timer { follow }) => {
            if follow {
                app.follow_timer()?;
            } else {
                println!("{}", app.render_timer());
            }
        }
        Some(Commands::Import { file, project }) => {
            let report = app.import_csv(&file, project.as_deref())?;
            println!("{}", report.summary());
        }
        Some(Commands::Stats { project }) => {
            print!("{}", app.render_stats(project.as_deref())?);
        }
        Some(Commands::Sync(command)) => run_sync(app, command)?,
    }
    Ok(())
}

fn run_task(app: &mut App, command: TaskCommands) -> Result<()> {
    match command {
        TaskCommands::Add {
            title,
            project,
            column,
            size,
            prompt,
            focus,
            notes,
        } => {
            let project_id = project.map(|p| app.resolve_project(&p)).transpose()?;
            let column = column
                .map(|c| parse_column(&c))
                .transpose()?
                .unwrap_or(Column::Backlog);
            let kind = match (prompt, size) {
                (Some(text), _) => TaskKind::Prompt { text },
                (None, Some(minutes)) => TaskKind::Timed(Timing::with_size(parse_size(minutes)?)),
                (None, None) => TaskKind::Timed(Timing::default()),
            };

            let task = app.store.create_task(&title, project_id, column, kind)?;
            if !focus.is_empty() || notes.is_some() {
                app.store.update_task(
                    task.id,
                    TaskPatch {
                        labels: (!focus.is_empty()).then_some(focus),
                        notes,
                        ..TaskPatch::default()
                    },
                );
            }
            println!("Added {}", task.title);
        }
        TaskCommands::Edit {
            task,
            title,
            project,
            no_project,
            column,
            size,
            estimate,
            prompt,
            focus,
            notes,
        } => {
            let id = app.resolve_task(&task)?;

            // Title validity is on the caller, the store merges as-is
            if let Some(title) = &title {
                if title.trim().is_empty() {
                    bail!("task title cannot be empty");
                }
            }

            let project_id = if no_project {
                Some(None)
            } else if let Some(needle) = project {
                Some(Some(app.resolve_project(&needle)?))
            } else {
                None
            };

            app.store.update_task(
                id,
                TaskPatch {
                    title,
                    project_id,
                    column: column.map(|c| parse_column(&c)).transpose()?,
                    notes,
                    labels: (!focus.is_empty()).then_some(focus),
                    size: size.map(parse_size).transpose()?,
                    estimate_minutes: estimate,
                    prompt_text: prompt,
                },
            );
            println!("Updated task");
        }
        TaskCommands::Move { task, column } => {
            let id = app.resolve_task(&task)?;
            let target = parse_column(&column)?;
            app.store.move_task(id, target);
            println!("Moved task to {}", target.display_name());
        }
        TaskCommands::Show { task } => {
            print!("{}", app.render_task(&task)?);
        }
        TaskCommands::Rm { task } => {
            let id = app.resolve_task(&task)?;
            app.store.delete_task(id);
            println!("Deleted task");
        }
    }
    Ok(())
}

fn run_project(app: &mut App, command: ProjectCommands) -> Result<()> {
    match command {
        ProjectCommands::Add {
            name,
            color,
            notes,
            focus,
        } => {
            let project = app.store.create_project(
                &name,
                color.as_deref(),
                notes.as_deref().unwrap_or(""),
                focus.as_deref(),
            )?;
            println!("Added project {}", project.name);
        }
        ProjectCommands::Edit {
            project,
            name,
            color,
            notes,
            focus,
            no_focus,
        } => {
            let id = app.resolve_project(&project)?;

            if let Some(name) = &name {
                if name.trim().is_empty() {
                    bail!("project name cannot be empty");
                }
            }

            let primary_area = if no_focus {
                Some(None)
            } else {
                focus.map(Some)
            };

            app.store.update_project(
                id,
                ProjectPatch {
                    name,
                    color,
                    notes,
                    primary_area,
                },
            );
            println!("Updated project");
        }
        ProjectCommands::List => {
            print!("{}", app.render_projects());
        }
        ProjectCommands::Rm { project } => {
            let id = app.resolve_project(&project)?;
            app.store.delete_project(id);
            println!("Deleted project (its tasks were unlinked, not deleted)");
        }
    }
    Ok(())
}

fn run_focus(app: &mut App, command: FocusCommands) -> Result<()> {
    match command {
        FocusCommands::Add { name } => match app.store.add_label(&name) {
            Ok(()) => println!("Added focus {}", name.trim()),
            Err(err) => app.notices.borrow_mut().error(err.to_string()),
        },
        FocusCommands::Rename { old, new } => match app.store.rename_label(&old, &new) {
            Ok(()) => println!("Renamed focus {} to {}", old, new.trim()),
            Err(err) => app.notices.borrow_mut().error(err.to_string()),
        },
        FocusCommands::Rm { name } => {
            app.store.delete_label(&name);
            println!("Deleted focus {name} (tasks and projects were kept)");
        }
        FocusCommands::List => {
            for label in &app.store.board().labels {
                println!("{label}");
            }
        }
    }
    Ok(())
}

fn run_sync(app: &mut App, command: SyncCommands) -> Result<()> {
    match command {
        SyncCommands::Signup { email, password } => app.sign_up(&email, &password)?,
        SyncCommands::Login { email, password } => app.sign_in(&email, &password)?,
        SyncCommands::Logout => app.sign_out()?,
        SyncCommands::Status => println!("{}", app.sync_status()),
        SyncCommands::Push => app.push()?,
        SyncCommands::Pull => {
            if !app.pull()? {
                println!("Already up to date");
            }
        }
        SyncCommands::Watch => app.watch()?,
    }
    Ok(())
}
