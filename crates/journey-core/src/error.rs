//! Error types for the journey engine
//!
//! Load-time errors are all-or-nothing and carry every issue found, so one
//! editing pass over the configuration can fix all of them. Query and update
//! errors are typed rejections raised before any traversal or mutation.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

fn render_lines<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| format!("  {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Catalog ──

/// A single problem found while validating the static catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogIssue {
    pub path: String,
    pub message: String,
}

impl CatalogIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// The catalog (cities, time windows, modules) was rejected.
#[derive(Debug, Clone, Error)]
#[error("catalog rejected with {} issue(s):\n{}", .issues.len(), render_lines(.issues))]
pub struct ValidationError {
    pub issues: Vec<CatalogIssue>,
}

// ── Task configuration ──

/// Validation rule that produced a [`ConfigIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Missing or mistyped field on a task or subtask.
    Structure,
    /// Subtask `type` tag is not a known variant.
    UnknownVariant,
    UnknownPhase,
    UnknownModule,
    UnknownCity,
    UnknownDependency,
    UnknownLinkedTask,
    /// Provider id is not a lowercase identifier.
    MalformedProvider,
    /// Provider id is absent from the platform directory. Advisory only.
    UnknownProvider,
    Cycle,
    DuplicateTask,
    DuplicateSubtask,
    DuplicateDocument,
}

impl Rule {
    pub fn code(&self) -> &'static str {
        match self {
            Rule::Structure => "structure",
            Rule::UnknownVariant => "unknown_variant",
            Rule::UnknownPhase => "unknown_phase",
            Rule::UnknownModule => "unknown_module",
            Rule::UnknownCity => "unknown_city",
            Rule::UnknownDependency => "unknown_dependency",
            Rule::UnknownLinkedTask => "unknown_linked_task",
            Rule::MalformedProvider => "malformed_provider",
            Rule::UnknownProvider => "unknown_provider",
            Rule::Cycle => "cycle",
            Rule::DuplicateTask => "duplicate_task",
            Rule::DuplicateSubtask => "duplicate_subtask",
            Rule::DuplicateDocument => "duplicate_document",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single problem found while validating the task configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigIssue {
    pub rule: Rule,
    /// Location in the raw document, e.g. `tasks[3] (open-bank-account).subtasks[0]`.
    pub path: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(rule: Rule, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.rule, self.path, self.message)
    }
}

/// A dependency cycle, listed in traversal order.
///
/// `A -> B -> C -> A` is reported as `["A", "B", "C"]`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("dependency cycle: {} -> {}", .path.join(" -> "), .path.first().map(String::as_str).unwrap_or(""))]
pub struct CycleError {
    pub path: Vec<String>,
}

/// The task configuration was rejected. Holds every issue found.
#[derive(Debug, Clone, Error)]
#[error("configuration rejected with {} issue(s):\n{}", .issues.len(), render_lines(.issues))]
pub struct ConfigError {
    pub issues: Vec<ConfigIssue>,
    cycles: Vec<CycleError>,
}

impl ConfigError {
    pub(crate) fn new(issues: Vec<ConfigIssue>, cycles: Vec<CycleError>) -> Self {
        Self { issues, cycles }
    }

    /// Cycles found in the dependency graph. Each also appears in `issues`.
    pub fn cycles(&self) -> &[CycleError] {
        &self.cycles
    }

    pub fn has_rule(&self, rule: Rule) -> bool {
        self.issues.iter().any(|i| i.rule == rule)
    }
}

// ── Runtime ──

/// No overlay, canonical content, or fallback had a string at `key`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no translation for '{key}' in locale '{locale}' or canonical content")]
pub struct MissingTranslationKey {
    pub key: String,
    pub locale: String,
}

/// A submitted form value does not satisfy its field constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("invalid value for field '{field}': {reason}")]
pub struct InvalidFieldValue {
    pub field: String,
    pub reason: String,
}

/// Typed not-found for per-request queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("unknown city '{0}'")]
    UnknownCity(String),

    #[error("unknown journey phase '{0}'")]
    UnknownPhase(String),
}

/// A progress update request was rejected. Nothing was applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("task '{task_id}' has no subtask '{subtask_id}'")]
    UnknownSubtask { task_id: String, subtask_id: String },

    #[error("task '{task_id}' has no document '{document_id}' in its checklist")]
    UnknownDocument { task_id: String, document_id: String },

    #[error("subtask '{subtask_id}' is a {actual} subtask, expected {expected}")]
    WrongVariant {
        subtask_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("subtask '{subtask_id}' has no field '{field}'")]
    UnknownField { subtask_id: String, field: String },

    #[error("subtask '{subtask_id}' does not list provider '{provider_id}'")]
    UnknownProvider {
        subtask_id: String,
        provider_id: String,
    },

    #[error(transparent)]
    InvalidValue(#[from] InvalidFieldValue),
}

/// Failure while building a snapshot from disk or from raw documents.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("config directory {0} has no journey.json or journey.yaml")]
    MissingDocument(PathBuf),

    #[error(transparent)]
    Catalog(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
