use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::{ActionLink, DocumentItem, Importance, Repeat};

// ── Top-level document ──

/// The raw journey document: `{cities, timeWindows, modules, tasks}`.
///
/// Tasks stay as raw JSON values here. Each one is deserialized separately
/// during validation so that one malformed task does not hide the issues in
/// the others.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyDocument {
    #[serde(flatten)]
    pub catalog: CatalogDto,
    #[serde(default)]
    pub tasks: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDto {
    #[serde(default)]
    pub cities: Vec<CityDto>,
    #[serde(default)]
    pub time_windows: Vec<TimeWindowDto>,
    #[serde(default)]
    pub modules: Vec<ModuleDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityDto {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindowDto {
    pub id: String,
    pub label: String,
    /// Derived from declaration order when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<u32>,
    /// Inclusive upper bound in days since arrival. Falls back to the
    /// default duration table for well-known phase ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_day: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDto {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

// ── Task ──

/// Raw task as written in configuration. Subtasks stay raw until the
/// validator dispatches them on their `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: String,
    pub time_window: String,
    pub module: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub repeat: Repeat,
    #[serde(default)]
    pub city_scope: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_note: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_links: Vec<ActionLink>,    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_checklist: Vec<DocumentItem>,
}

// ── Parsing ──

/// Parse a JSON journey document. Validation is NOT performed here.
pub fn parse_document_json(json: &str) -> Result<JourneyDocument, serde_json::Error> {
    serde_json::from_str(json)
}

/// Parse a YAML journey document. Validation is NOT performed here.
pub fn parse_document_yaml(yaml: &str) -> Result<JourneyDocument, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}
