use serde::{Deserialize, Serialize};

/// Workflow stage of a task on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Backlog,
    Ready,
    Doing,
    Done,
}

impl Column {
    /// User-visible column name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Backlog => "Later",
            Self::Ready => "Next",
            Self::Doing => "Now",
            Self::Done => "Done",
        }
    }

    /// Parse a storage key like "backlog"
    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            "backlog" => Some(Self::Backlog),
            "ready" => Some(Self::Ready),
            "doing" => Some(Self::Doing),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// Parse the import vocabulary (Later/Next/Now/Done, case-insensitive)
    pub fn from_import_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "later" => Some(Self::Backlog),
            "next" => Some(Self::Ready),
            "now" => Some(Self::Doing),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// All columns in board order
    pub fn all() -> &'static [Column] {
        &[Self::Backlog, Self::Ready, Self::Doing, Self::Done]
    }
}

/// Coarse duration bucket for a timed task, in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum TaskSize {
    One,
    Five,
    Fifteen,
    Thirty,
}

impl TaskSize {
    pub fn minutes(&self) -> u32 {
        match self {
            Self::One => 1,
            Self::Five => 5,
            Self::Fifteen => 15,
            Self::Thirty => 30,
        }
    }

    /// Parse a minute count; only 1/5/15/30 are valid sizes
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        match minutes {
            1 => Some(Self::One),
            5 => Some(Self::Five),
            15 => Some(Self::Fifteen),
            30 => Some(Self::Thirty),
            _ => None,
        }
    }

    /// All sizes in ascending order
    pub fn all() -> &'static [TaskSize] {
        &[Self::One, Self::Five, Self::Fifteen, Self::Thirty]
    }
}

impl Default for TaskSize {
    fn default() -> Self {
        Self::Five
    }
}

impl From<TaskSize> for u32 {
    fn from(size: TaskSize) -> u32 {
        size.minutes()
    }
}

impl TryFrom<u32> for TaskSize {
    type Error = String;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        TaskSize::from_minutes(minutes).ok_or_else(|| format!("invalid task size: {}m", minutes))
    }
}
