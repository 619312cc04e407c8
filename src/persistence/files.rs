use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Get the tempo directory - checks for a local .tempo first, then falls
/// back to the global ~/.tempo
pub fn get_tempo_dir() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Could not determine current directory")?;
    if let Some(local_dir) = find_local_tempo(&current_dir) {
        return Ok(local_dir);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".tempo"))
}

/// Find a local .tempo directory by walking up the directory tree
fn find_local_tempo(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let tempo_dir = current.join(".tempo");
        if tempo_dir.exists() && tempo_dir.is_dir() {
            return Some(tempo_dir);
        }
        current = current.parent()?;
    }
}

/// Ensure the tempo directory exists
pub fn ensure_tempo_dir() -> Result<PathBuf> {
    let dir = get_tempo_dir()?;
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(dir)
}

/// Path to the board snapshot file
pub fn board_file() -> Result<PathBuf> {
    Ok(ensure_tempo_dir()?.join("board.json"))
}

/// Path to the stored auth session file
pub fn session_file() -> Result<PathBuf> {
    Ok(ensure_tempo_dir()?.join("session.json"))
}

/// Atomically write content to a file using temp file + rename
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .context("File path has no parent directory")?;

    let mut temp_file =
        NamedTempFile::new_in(dir).context("Failed to create temporary file")?;

    temp_file
        .write_all(content.as_bytes())
        .context("Failed to write to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .context("Failed to sync temporary file")?;

    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist file: {}", path.display()))?;

    Ok(())
}

/// Read file content, return empty string if the file doesn't exist
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_tempo_dir() {
        let dir = get_tempo_dir().unwrap();
        assert!(dir.to_string_lossy().contains(".tempo"));
    }

    #[test]
    fn test_atomic_write_and_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("test.txt");

        let content = "Hello, world!";
        atomic_write(&test_file, content).unwrap();

        let read_content = read_file(&test_file).unwrap();
        assert_eq!(read_content, content);
    }

    #[test]
    fn test_read_nonexistent_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("nonexistent.txt");

        let content = read_file(&test_file).unwrap();
        assert_eq!(content, "");
    }
}
