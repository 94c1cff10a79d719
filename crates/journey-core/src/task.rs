//! Validated task records
//!
//! Tasks are defined entirely by configuration and never change at runtime.
//! Lock, completion, and status are derived per user elsewhere.

use serde::{Deserialize, Serialize};

use crate::subtask::Subtask;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repeat {
    #[default]
    Once,
    Recurring,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Official,
    Tool,
    Community,
    #[default]
    Info,
}

/// An external link shown alongside a task, optionally limited to cities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLink {
    pub id: String,
    pub label: String,
    pub url: String,
    #[serde(default, rename = "type")]
    pub kind: LinkKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub city_scope: Vec<String>,
}

impl ActionLink {
    pub fn visible_in(&self, city: Option<&str>) -> bool {
        scope_admits(&self.city_scope, city)
    }
}

/// A paper the user should gather for a task. Collected state lives in
/// the user's progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DocumentItem {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub time_window: String,
    pub module: String,
    pub title: String,
    pub description: String,
    /// Deduplicated, in declaration order.
    pub dependencies: Vec<String>,
    pub importance: Importance,
    pub repeat: Repeat,
    /// Empty means every city.
    pub city_scope: Vec<String>,
    pub subtasks: Vec<Subtask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_note: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub action_links: Vec<ActionLink>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub document_checklist: Vec<DocumentItem>,
}

impl Task {
    pub fn subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id() == id)
    }

    pub fn document(&self, id: &str) -> Option<&DocumentItem> {
        self.document_checklist.iter().find(|d| d.id == id)
    }

    pub fn required_subtasks(&self) -> impl Iterator<Item = &Subtask> {
        self.subtasks.iter().filter(|s| s.required())
    }

    /// True when the task applies to `city`. `None` means no city filter.
    pub fn visible_in(&self, city: Option<&str>) -> bool {
        scope_admits(&self.city_scope, city)
    }

    /// Key prefix for translated task text: `tasks.<contentKey or id>`.
    pub fn content_key(&self) -> &str {
        self.content_key.as_deref().unwrap_or(self.id.as_str())
    }
}

fn scope_admits(scope: &[String], city: Option<&str>) -> bool {
    match city {
        None => true,
        Some(city) => scope.is_empty() || scope.iter().any(|c| c == city),
    }
}
