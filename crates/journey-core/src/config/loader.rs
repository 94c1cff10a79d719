//! Configuration loader
//!
//! Reads the journey document, platform directory, and locale overlays from
//! a config directory and builds a [`Journey`] snapshot.
//!
//! Directory layout:
//!
//! ```text
//! config/
//!   journey.json | journey.yaml | journey.yml
//!   platforms.json            (optional)
//!   locales/en.json           (canonical, optional)
//!   locales/<code>.json       (overlays)
//! ```

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use super::dto::{parse_document_json, parse_document_yaml, JourneyDocument};
use crate::error::LoadError;
use crate::journey::Journey;
use crate::locale::{LocaleCatalog, CANONICAL_LOCALE};
use crate::platforms::PlatformCatalog;

pub const CONFIG_DIR_ENV: &str = "JOURNEY_CONFIG_DIR";

const DOCUMENT_NAMES: &[&str] = &["journey.json", "journey.yaml", "journey.yml"];

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Resolve the config directory.
    ///
    /// 1. `JOURNEY_CONFIG_DIR` environment variable
    /// 2. `./config` when it holds a journey document
    /// 3. a `config/` directory found walking up from `CARGO_MANIFEST_DIR`
    ///    (runtime, then compile time) so tests find the workspace config
    pub fn from_env() -> Self {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Self::new(dir);
        }

        if has_document(Path::new("config")) {
            return Self::new("config");
        }

        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            if let Some(found) = find_workspace_config(Path::new(&manifest_dir)) {
                return Self::new(found);
            }
        }

        if let Some(found) = find_workspace_config(Path::new(env!("CARGO_MANIFEST_DIR"))) {
            return Self::new(found);
        }

        // Let load() fail with a clear path.
        Self::new("config")
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn load_document(&self) -> Result<JourneyDocument, LoadError> {
        let path = DOCUMENT_NAMES
            .iter()
            .map(|name| self.config_dir.join(name))
            .find(|p| p.is_file())
            .ok_or_else(|| LoadError::MissingDocument(self.config_dir.clone()))?;

        let text = read(&path)?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        let parsed = if is_yaml {
            parse_document_yaml(&text).map_err(|e| e.to_string())
        } else {
            parse_document_json(&text).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| LoadError::Parse { path, message })
    }

    /// Missing file means no platform metadata, not an error.
    pub fn load_platforms(&self) -> Result<PlatformCatalog, LoadError> {
        let path = self.config_dir.join("platforms.json");
        if !path.is_file() {
            warn!(path = %path.display(), "no platform directory; provider names shown as ids");
            return Ok(PlatformCatalog::empty());
        }
        let text = read(&path)?;
        PlatformCatalog::from_json(&text).map_err(|e| LoadError::Parse {
            path,
            message: e.to_string(),
        })
    }

    /// `locales/en.json` is the canonical tree; every other `<code>.json` is
    /// an overlay keyed by its file stem.
    pub fn load_locales(&self) -> Result<LocaleCatalog, LoadError> {
        let dir = self.config_dir.join("locales");
        if !dir.is_dir() {
            return Ok(LocaleCatalog::default());
        }

        let entries = std::fs::read_dir(&dir).map_err(|source| LoadError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LoadError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();

        let mut base = None;
        let mut overlays = Vec::new();
        for path in files {
            let Some(code) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let text = read(&path)?;
            let tree: Value = serde_json::from_str(&text).map_err(|e| LoadError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?;
            if code == CANONICAL_LOCALE {
                base = Some(tree);
            } else {
                overlays.push((code, tree));
            }
        }

        let base = base.unwrap_or_else(|| Value::Object(Default::default()));
        let mut catalog = LocaleCatalog::new(CANONICAL_LOCALE, base);
        for (code, tree) in overlays {
            catalog.insert_overlay(code, tree);
        }
        Ok(catalog)
    }

    /// Load and validate everything into one snapshot.
    pub fn load(&self) -> Result<Journey, LoadError> {
        let document = self.load_document()?;
        let platforms = self.load_platforms()?;
        let locales = self.load_locales()?;
        let journey = Journey::build(&document, platforms, locales)?;

        info!(
            config_dir = %self.config_dir.display(),
            tasks = journey.graph().len(),
            cities = journey.catalog().cities().len(),
            phases = journey.catalog().phases_ordered().len(),
            locales = ?journey.locales().locales(),
            warnings = journey.config().warnings().len(),
            fingerprint = %journey.config().fingerprint(),
            "journey configuration loaded"
        );
        Ok(journey)
    }
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn has_document(dir: &Path) -> bool {
    DOCUMENT_NAMES.iter().any(|name| dir.join(name).is_file())
}

/// Walk up to five levels looking for `config/` with a journey document.
fn find_workspace_config(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    for _ in 0..5 {
        let candidate = current.join("config");
        if has_document(&candidate) {
            return Some(candidate);
        }
        current = current.parent()?;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rule;
    use std::fs;

    const DOC: &str = r#"{
        "cities": [{"id": "berlin", "name": "Berlin"}],
        "timeWindows": [{"id": "pre_arrival", "label": "Before arrival"}, {"id": "week_1", "label": "Week 1"}],
        "modules": [{"id": "finance", "label": "Finance"}],
        "tasks": [
            {"id": "bank", "timeWindow": "week_1", "module": "finance", "title": "Open a bank account",
             "subtasks": [{"id": "choose", "title": "Choose", "type": "external_action",
                           "actionType": "bank_signup", "providers": ["n26", "unlisted_bank"]}]}
        ]
    }"#;

    fn write_config(dir: &Path) {
        fs::write(dir.join("journey.json"), DOC).unwrap();
        fs::write(
            dir.join("platforms.json"),
            r#"{"categories": {"banking": {"label": "Banking", "services": [
                {"id": "n26", "name": "N26", "baseUrl": "https://n26.com"}
            ]}}}"#,
        )
        .unwrap();
        fs::create_dir(dir.join("locales")).unwrap();
        fs::write(
            dir.join("locales/en.json"),
            r#"{"tasks": {"bank": {"title": "Open a bank account"}}}"#,
        )
        .unwrap();
        fs::write(
            dir.join("locales/tr.json"),
            r#"{"tasks": {"bank": {"title": "Banka hesabı aç"}}}"#,
        )
        .unwrap();
    }

    #[test]
    fn loads_a_full_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path());

        let journey = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(journey.graph().len(), 1);
        assert_eq!(journey.locales().locales(), vec!["en", "tr"]);
        assert_eq!(journey.translate("tasks.bank.title", "tr"), "Banka hesabı aç");
        assert_eq!(journey.config().warnings().len(), 1);
        assert_eq!(journey.config().warnings()[0].rule, Rule::UnknownProvider);
    }

    #[test]
    fn yaml_document_and_missing_extras() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("journey.yaml"),
            r#"
cities: [{id: aachen, name: Aachen}]
timeWindows: [{id: pre_arrival, label: Before arrival}]
modules: [{id: housing, label: Housing}]
tasks:
  - {id: flat, timeWindow: pre_arrival, module: housing, title: Find a flat}
"#,
        )
        .unwrap();

        let journey = ConfigLoader::new(dir.path()).load().unwrap();
        assert_eq!(journey.graph().len(), 1);
        assert!(journey.platforms().is_empty());
        assert_eq!(journey.locales().locales(), vec!["en"]);
    }

    #[test]
    fn missing_document_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigLoader::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, LoadError::MissingDocument(_)));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("journey.json"), "{ nope").unwrap();
        let err = ConfigLoader::new(dir.path()).load().unwrap_err();
        match err {
            LoadError::Parse { path, .. } => assert!(path.ends_with("journey.json")),
            other => panic!("expected parse error, got {}", other),
        }
    }

    #[test]
    fn invalid_tasks_surface_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("journey.json"),
            DOC.replace("\"module\": \"finance\"", "\"module\": \"nowhere\""),
        )
        .unwrap();
        let err = ConfigLoader::new(dir.path()).load().unwrap_err();
        match err {
            LoadError::Config(e) => assert!(e.has_rule(Rule::UnknownModule)),
            other => panic!("expected config error, got {}", other),
        }
    }
}
