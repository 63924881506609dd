//! Workflow definition lookup.
//!
//! Definitions live in a directory with one folder per definition:
//!
//! ```text
//! {definition_dir}/
//!   variant-calling/
//!     metadata.json     {"id": "...", "name": "...", "allowed_entitlements": [...], "input_mapping": {...}}
//!     Snakefile
//!     envs/...
//! ```
//!
//! Hidden entries (leading `.`) and plain files are ignored. Keeping the
//! directory in sync with its source repository is done elsewhere.

use std::fs;
use std::path::{Path, PathBuf};

use tessera_types::{DefinitionListItem, WorkflowDefinition};
use uuid::Uuid;

use crate::error::{PipelineError, Result};

const METADATA_FILE: &str = "metadata.json";

/// Looks up workflow definitions by id.
pub trait DefinitionResolver: Send + Sync {
    /// All readable definitions.
    fn definitions(&self) -> Result<Vec<WorkflowDefinition>>;

    /// The definition with `id`, if present.
    fn resolve(&self, id: Uuid) -> Result<Option<WorkflowDefinition>> {
        Ok(self.definitions()?.into_iter().find(|d| d.id == id))
    }

    /// Summaries including the entry file source, for the list-definitions surface.
    fn list_items(&self) -> Result<Vec<DefinitionListItem>> {
        self.definitions()?
            .into_iter()
            .map(|def| {
                let definition = fs::read_to_string(def.entry_path()).map_err(|e| {
                    PipelineError::InvalidDefinition(format!(
                        "{}: cannot read {}: {e}",
                        def.id,
                        def.entry_path().display()
                    ))
                })?;
                Ok(DefinitionListItem {
                    id: def.id,
                    name: def.name,
                    definition,
                })
            })
            .collect()
    }
}

/// Resolver over a local definitions directory.
#[derive(Debug, Clone)]
pub struct DirectoryDefinitionResolver {
    root: PathBuf,
}

impl DirectoryDefinitionResolver {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn definition_dirs(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            PipelineError::InvalidDefinition(format!(
                "cannot read definition directory {}: {e}",
                self.root.display()
            ))
        })?;

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }
}

/// Read `{dir}/metadata.json` into a definition rooted at `dir`.
pub fn load_definition(dir: &Path) -> Result<WorkflowDefinition> {
    let path = dir.join(METADATA_FILE);
    let text = fs::read_to_string(&path).map_err(|e| {
        PipelineError::InvalidDefinition(format!("cannot read {}: {e}", path.display()))
    })?;
    let mut definition: WorkflowDefinition = serde_json::from_str(&text).map_err(|e| {
        PipelineError::InvalidDefinition(format!("{}: {e}", path.display()))
    })?;
    definition.template_dir = dir.to_path_buf();
    Ok(definition)
}

impl DefinitionResolver for DirectoryDefinitionResolver {
    fn definitions(&self) -> Result<Vec<WorkflowDefinition>> {
        let mut out = Vec::new();
        for dir in self.definition_dirs()? {
            match load_definition(&dir) {
                Ok(def) => out.push(def),
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "Skipping workflow definition"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ID_A: &str = "5b1f7e3c-2a9c-4f55-9d43-3f3d3b0f3c11";
    const ID_B: &str = "0d4c3a7e-8a51-4b8e-9d2c-7f7d8e0b1a22";

    fn write_def(root: &Path, folder: &str, id: &str, name: &str) {
        let dir = root.join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("metadata.json"),
            format!(r#"{{"id": "{id}", "name": "{name}"}}"#),
        )
        .unwrap();
        fs::write(dir.join("Snakefile"), format!("rule all:  # {name}\n")).unwrap();
    }

    #[test]
    fn test_lists_and_resolves() {
        let root = TempDir::new().unwrap();
        write_def(root.path(), "a", ID_A, "Alpha");
        write_def(root.path(), "b", ID_B, "Beta");

        let resolver = DirectoryDefinitionResolver::new(root.path());
        assert_eq!(resolver.definitions().unwrap().len(), 2);

        let a = resolver.resolve(ID_A.parse().unwrap()).unwrap().unwrap();
        assert_eq!(a.name, "Alpha");
        assert_eq!(a.template_dir, root.path().join("a"));
        assert!(resolver.resolve(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_skips_hidden_files_and_broken_metadata() {
        let root = TempDir::new().unwrap();
        write_def(root.path(), "a", ID_A, "Alpha");
        write_def(root.path(), ".git", ID_B, "Hidden");
        fs::write(root.path().join("README.md"), "docs").unwrap();
        fs::create_dir_all(root.path().join("broken")).unwrap();
        fs::write(root.path().join("broken/metadata.json"), "{").unwrap();

        let resolver = DirectoryDefinitionResolver::new(root.path());
        let defs = resolver.definitions().unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "Alpha");
    }

    #[test]
    fn test_list_items_include_entry_source() {
        let root = TempDir::new().unwrap();
        write_def(root.path(), "a", ID_A, "Alpha");

        let items = DirectoryDefinitionResolver::new(root.path()).list_items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].definition, "rule all:  # Alpha\n");
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let resolver = DirectoryDefinitionResolver::new(Path::new("/nonexistent/tessera-defs"));
        assert!(resolver.definitions().is_err());
    }
}
