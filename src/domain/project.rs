use chrono::{DateTime, Local};
use uuid::Uuid;

/// Default display color for new projects
pub const DEFAULT_PROJECT_COLOR: &str = "#6366f1";

/// A project grouping tasks on the board
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Unique ID for internal references
    pub id: Uuid,
    /// Project name
    pub name: String,
    /// Display color hint (hex string)
    pub color: String,
    /// Multi-line notes
    pub notes: String,
    /// Focus area new tasks of this project inherit as an initial label
    pub primary_area: Option<String>,
    /// When the project was created
    pub created_at: DateTime<Local>,
}

impl Project {
    pub fn new(name: String, color: String, notes: String, primary_area: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            color,
            notes,
            primary_area,
            created_at: Local::now(),
        }
    }
}
