//! Task configuration: parsing, validation, and the validated model.
//!
//! Loading is all-or-nothing. Either every task passes structural,
//! referential, graph, and uniqueness checks and a [`TaskConfig`] is produced,
//! or a [`ConfigError`] lists every issue found.

pub mod dto;
pub mod loader;
mod validate;

use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::catalog::CatalogStore;
use crate::error::{ConfigError, ConfigIssue, QueryError};
use crate::graph::TaskGraph;
use crate::platforms::PlatformCatalog;
use crate::progress::UserProgress;
use crate::task::Task;

/// The validated, immutable task model.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    catalog: Arc<CatalogStore>,
    graph: TaskGraph,
    warnings: Vec<ConfigIssue>,
    fingerprint: String,
}

impl TaskConfig {
    pub fn load(raw_tasks: &[Value], catalog: Arc<CatalogStore>) -> Result<Self, ConfigError> {
        Self::build(raw_tasks, catalog, None)
    }

    /// Like [`TaskConfig::load`], also checking provider ids against the
    /// platform directory. Unknown providers are warnings, never errors.
    pub fn load_with_platforms(
        raw_tasks: &[Value],
        catalog: Arc<CatalogStore>,
        platforms: &PlatformCatalog,
    ) -> Result<Self, ConfigError> {
        Self::build(raw_tasks, catalog, Some(platforms))
    }

    fn build(
        raw_tasks: &[Value],
        catalog: Arc<CatalogStore>,
        platforms: Option<&PlatformCatalog>,
    ) -> Result<Self, ConfigError> {
        let validation = validate::validate_tasks(raw_tasks, &catalog, platforms);
        if !validation.issues.is_empty() {
            return Err(ConfigError::new(validation.issues, validation.cycles));
        }

        let fingerprint = fingerprint(raw_tasks);
        let graph = TaskGraph::from_validated(validation.tasks);
        tracing::debug!(
            tasks = graph.len(),
            warnings = validation.warnings.len(),
            fingerprint = %fingerprint,
            "task configuration accepted"
        );

        Ok(Self {
            catalog,
            graph,
            warnings: validation.warnings,
            fingerprint,
        })
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Advisory issues that did not block loading.
    pub fn warnings(&self) -> &[ConfigIssue] {
        &self.warnings
    }

    /// Hex SHA-256 over the canonical JSON of the raw task list.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn task(&self, id: &str) -> Result<&Task, QueryError> {
        self.graph.get(id)
    }

    pub fn tasks(&self) -> &[Task] {
        self.graph.tasks()
    }

    pub fn is_unlocked(&self, task_id: &str, progress: &UserProgress) -> Result<bool, QueryError> {
        self.graph.is_unlocked(task_id, progress)
    }

    pub fn topological_order(&self) -> Vec<&Task> {
        self.graph.topological_order()
    }

    /// Tasks shown to a user in `city`, in topological order.
    pub fn visible_for(&self, city: &str) -> Result<Vec<&Task>, QueryError> {
        self.catalog.require_city(city)?;
        Ok(self.graph.visible_in(city))
    }
}

/// `serde_json::Value` keeps object keys sorted, so its compact rendering is
/// canonical regardless of the source key order or format.
fn fingerprint(raw_tasks: &[Value]) -> String {
    let mut hasher = Sha256::new();
    for task in raw_tasks {
        hasher.update(task.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
