//! Platform directory
//!
//! Display metadata for third-party services referenced by external-action
//! subtasks. Not used for completion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformService {
    pub id: String,
    pub name: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCategory {
    pub label: String,
    #[serde(default)]
    pub services: Vec<PlatformService>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCatalog {
    #[serde(default)]
    pub categories: BTreeMap<String, PlatformCategory>,
}

impl PlatformCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn service(&self, id: &str) -> Option<&PlatformService> {
        self.categories
            .values()
            .flat_map(|c| c.services.iter())
            .find(|s| s.id == id)
    }

    /// Category id containing the service.
    pub fn category_of(&self, service_id: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, c)| c.services.iter().any(|s| s.id == service_id))
            .map(|(id, _)| id.as_str())
    }

    pub fn contains(&self, service_id: &str) -> bool {
        self.service(service_id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(|c| c.services.is_empty())
    }
}
