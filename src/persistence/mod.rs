pub mod files;
pub mod local;

pub use files::{atomic_write, board_file, ensure_tempo_dir, get_tempo_dir, read_file, session_file};
pub use local::{
    load_snapshot, save_snapshot, ProjectRecord, Snapshot, TaskRecord, TimeEntryRecord,
};
