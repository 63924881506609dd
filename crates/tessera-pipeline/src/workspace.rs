//! Per-run working directories.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{PipelineError, Result};
use crate::template::render_placeholders;

/// An isolated copy of a definition's template for one run.
#[derive(Debug)]
pub struct RunWorkspace {
    dir: PathBuf,
    entry_file: String,
}

impl RunWorkspace {
    /// Deep-copy `template_dir` to `{root}/{run_id}` and substitute
    /// `{{placeholders}}` in the entry file.
    pub fn prepare(
        template_dir: &Path,
        root: &Path,
        run_id: &str,
        entry_file: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<Self> {
        if !template_dir.is_dir() {
            return Err(PipelineError::WorkspaceSetup(format!(
                "template directory {} does not exist",
                template_dir.display()
            )));
        }

        let dir = root.join(run_id);
        if dir.exists() {
            return Err(PipelineError::WorkspaceSetup(format!(
                "workspace {} already exists",
                dir.display()
            )));
        }

        let workspace = Self {
            dir,
            entry_file: entry_file.to_string(),
        };
        if let Err(e) = workspace.populate(template_dir, values) {
            workspace.remove();
            return Err(e);
        }
        Ok(workspace)
    }

    fn populate(&self, template_dir: &Path, values: &BTreeMap<String, String>) -> Result<()> {
        copy_tree(template_dir, &self.dir)?;

        let entry = self.entry_path();
        let source = fs::read_to_string(&entry).map_err(|e| {
            PipelineError::WorkspaceSetup(format!("cannot read {}: {e}", entry.display()))
        })?;
        fs::write(&entry, render_placeholders(&source, values)).map_err(|e| {
            PipelineError::WorkspaceSetup(format!("cannot write {}: {e}", entry.display()))
        })?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self) -> PathBuf {
        self.dir.join(&self.entry_file)
    }

    /// Delete the workspace. Failures are logged, never returned.
    pub fn remove(&self) {
        if !self.dir.exists() {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to remove run workspace");
        }
    }
}

fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let setup_err = |what: &str, path: &Path, e: std::io::Error| {
        PipelineError::WorkspaceSetup(format!("{what} {}: {e}", path.display()))
    };

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| PipelineError::WorkspaceSetup(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PipelineError::WorkspaceSetup(e.to_string()))?;
        // Version-control metadata is not part of the pipeline.
        if rel.components().next().is_some_and(|c| c.as_os_str() == ".git") {
            continue;
        }
        let target = dst.join(rel);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| setup_err("cannot create", &target, e))?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).map_err(|e| setup_err("cannot copy", entry.path(), e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src)
        .map_err(|e| PipelineError::WorkspaceSetup(format!("cannot read link {}: {e}", src.display())))?;
    std::os::unix::fs::symlink(&link, dst)
        .map_err(|e| PipelineError::WorkspaceSetup(format!("cannot link {}: {e}", dst.display())))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .map(|_| ())
        .map_err(|e| PipelineError::WorkspaceSetup(format!("cannot copy {}: {e}", src.display())))
}
