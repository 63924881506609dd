use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use crate::Result;

/// Directory of append-only pipeline output logs, one file per run.
///
/// Layout: `{log_dir}/{user}/{epoch_ms}_{workflow_id}.txt`
#[derive(Debug, Clone)]
pub struct RunLogDir {
    root: PathBuf,
}

impl RunLogDir {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the log file for a new run.
    pub fn create(&self, user: &str, workflow_id: Uuid) -> Result<RunLog> {
        let dir = self.root.join(sanitize_segment(user));
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}_{}.txt", Utc::now().timestamp_millis(), workflow_id));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        tracing::debug!(%workflow_id, path = %path.display(), "Run log created");
        Ok(RunLog { path, file })
    }

    /// Log files of `user`, oldest first.
    pub fn list(&self, user: &str) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(sanitize_segment(user));
        if !dir.is_dir() {
            tracing::debug!(user, "No run logs");
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Open handle on one run's log file.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    file: File,
}

impl RunLog {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line of pipeline output.
    pub fn append_line(&mut self, line: &str) -> Result<()> {
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        Ok(())
    }
}

// Usernames come from a request header; keep them inside the log root.
fn sanitize_segment(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}
