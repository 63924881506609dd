//! Workflow definition metadata.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entry file used when a definition does not name one.
pub const DEFAULT_ENTRY_FILE: &str = "Snakefile";

/// Entitlement rule describing `^prefix(value1|value2|...)suffix$`.
///
/// All three parts are regular-expression fragments; `values` keeps its
/// declaration order so the rendered alternation is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRule {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub suffix: String,
}

impl EntitlementRule {
    pub fn new(prefix: impl Into<String>, values: Vec<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            values,
            suffix: suffix.into(),
        }
    }
}

/// A template pipeline plus the metadata a run instantiates it with.
///
/// Deserialized from a definition folder's `metadata.json`; `template_dir`
/// is filled in by the resolver from the folder location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub name: String,
    #[serde(skip)]
    pub template_dir: PathBuf,
    #[serde(default = "default_entry_file")]
    pub entry_file: String,
    /// Empty means no entitlement grants access.
    #[serde(default)]
    pub allowed_entitlements: Vec<EntitlementRule>,
    /// Placeholder name to a format template over run parameters, e.g. `"s3://{dataset}/in"`.
    #[serde(default)]
    pub input_mapping: BTreeMap<String, String>,
}

fn default_entry_file() -> String {
    DEFAULT_ENTRY_FILE.to_string()
}

impl WorkflowDefinition {
    /// Path of the entry file inside the template directory.
    pub fn entry_path(&self) -> PathBuf {
        self.template_dir.join(&self.entry_file)
    }
}

/// Definition summary returned by the list-definitions surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionListItem {
    pub id: Uuid,
    pub name: String,
    /// Source text of the definition's entry file.
    pub definition: String,
}

/// Caller-chosen parameters for a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParameters {
    pub input_dir: String,
    pub output_dir: String,
}

impl RunParameters {
    pub fn new(input_dir: impl Into<String>, output_dir: impl Into<String>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Named values visible to input-mapping templates.
    pub fn template_vars(&self) -> BTreeMap<&'static str, &str> {
        BTreeMap::from([
            ("dataset", self.input_dir.as_str()),
            ("input_dir", self.input_dir.as_str()),
            ("output_dir", self.output_dir.as_str()),
        ])
    }
}
