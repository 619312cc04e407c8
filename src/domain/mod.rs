pub mod enums;
pub mod project;
pub mod task;
pub mod views;

pub use enums::{Column, TaskSize};
pub use project::{Project, DEFAULT_PROJECT_COLOR};
pub use task::{Task, TaskKind, TimeEntry, Timing};
pub use views::{
    filtered_tasks, format_clock, format_minutes, project_stats, today_stats, Filters,
    ProjectSelection, ProjectStats, TodayStats,
};
