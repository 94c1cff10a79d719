//! Locale Overlay Merger
//!
//! Canonical (`en`) content is the base tree; every other locale is a sparse
//! overlay of the same shape. Lookups fall back overlay → canonical → raw key,
//! so a partially translated locale never breaks rendering.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::MissingTranslationKey;

pub const CANONICAL_LOCALE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleMeta {
    pub code: &'static str,
    pub label: &'static str,
    pub native_label: &'static str,
    pub direction: TextDirection,
}

pub const SUPPORTED_LOCALES: &[LocaleMeta] = &[
    LocaleMeta {
        code: "en",
        label: "English",
        native_label: "English",
        direction: TextDirection::Ltr,
    },
    LocaleMeta {
        code: "tr",
        label: "Turkish",
        native_label: "Türkçe",
        direction: TextDirection::Ltr,
    },
    LocaleMeta {
        code: "ar",
        label: "Arabic",
        native_label: "العربية",
        direction: TextDirection::Rtl,
    },
    LocaleMeta {
        code: "de",
        label: "German",
        native_label: "Deutsch",
        direction: TextDirection::Ltr,
    },
];

/// Lowercased primary subtag with ISO 639-2 aliases folded in:
/// `"tr-TR"` → `"tr"`, `"GER"` → `"de"`.
fn primary_subtag(code: &str) -> String {
    let primary = code
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match primary.as_str() {
        "eng" => "en".to_string(),
        "tur" => "tr".to_string(),
        "ara" => "ar".to_string(),
        "deu" | "ger" => "de".to_string(),
        _ => primary,
    }
}

/// Map any locale tag onto a supported code. Unsupported tags map to `en`.
pub fn normalize_locale(code: &str) -> &'static str {
    let primary = primary_subtag(code);
    SUPPORTED_LOCALES
        .iter()
        .find(|m| m.code == primary)
        .map(|m| m.code)
        .unwrap_or(CANONICAL_LOCALE)
}

pub fn locale_meta(code: &str) -> &'static LocaleMeta {
    let code = normalize_locale(code);
    SUPPORTED_LOCALES
        .iter()
        .find(|m| m.code == code)
        .unwrap_or(&SUPPORTED_LOCALES[0])
}

#[derive(Debug, Clone)]
pub struct LocaleCatalog {
    canonical: String,
    base: Value,
    overlays: BTreeMap<String, Value>,
}

impl Default for LocaleCatalog {
    fn default() -> Self {
        Self::new(CANONICAL_LOCALE, Value::Object(Default::default()))
    }
}

impl LocaleCatalog {
    pub fn new(canonical: impl Into<String>, base: Value) -> Self {
        Self {
            canonical: canonical.into(),
            base,
            overlays: BTreeMap::new(),
        }
    }

    pub fn with_overlay(mut self, locale: impl Into<String>, overlay: Value) -> Self {
        self.insert_overlay(locale, overlay);
        self
    }

    pub fn insert_overlay(&mut self, locale: impl Into<String>, overlay: Value) {
        self.overlays.insert(locale.into(), overlay);
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Canonical first, then overlays alphabetically.
    pub fn locales(&self) -> Vec<&str> {
        std::iter::once(self.canonical.as_str())
            .chain(
                self.overlays
                    .keys()
                    .map(String::as_str)
                    .filter(|l| *l != self.canonical),
            )
            .collect()
    }

    pub fn supports(&self, locale: &str) -> bool {
        locale == self.canonical || self.overlays.contains_key(locale)
    }

    /// The loaded locale a tag refers to, or the canonical one.
    pub fn normalize<'a>(&'a self, locale: &str) -> &'a str {
        let primary = primary_subtag(locale);
        if primary == self.canonical {
            return &self.canonical;
        }
        self.overlays
            .get_key_value(primary.as_str())
            .map(|(k, _)| k.as_str())
            .unwrap_or(self.canonical.as_str())
    }

    fn overlay_for(&self, locale: &str) -> Option<&Value> {
        let locale = self.normalize(locale);
        if locale == self.canonical {
            None
        } else {
            self.overlays.get(locale)
        }
    }

    pub fn try_resolve(&self, key: &str, locale: &str) -> Result<String, MissingTranslationKey> {
        self.overlay_for(locale)
            .and_then(|overlay| lookup(overlay, key))
            .or_else(|| lookup(&self.base, key))
            .map(str::to_string)
            .ok_or_else(|| MissingTranslationKey {
                key: key.to_string(),
                locale: locale.to_string(),
            })
    }

    /// Overlay, then canonical, then the raw key itself.
    pub fn resolve(&self, key: &str, locale: &str) -> String {
        self.try_resolve(key, locale).unwrap_or_else(|missing| {
            tracing::debug!(key = %missing.key, locale = %missing.locale, "translation missing");
            missing.key
        })
    }

    /// Like [`LocaleCatalog::resolve`] with a caller-supplied last resort.
    pub fn resolve_or(&self, key: &str, locale: &str, fallback: &str) -> String {
        self.try_resolve(key, locale)
            .unwrap_or_else(|_| fallback.to_string())
    }

    /// Canonical tree with the locale's overlay merged over it key by key.
    pub fn merged(&self, locale: &str) -> Value {
        let mut tree = self.base.clone();
        if let Some(overlay) = self.overlay_for(locale) {
            deep_merge(&mut tree, overlay);
        }
        tree
    }
}

/// Walk a dotted path. Only non-empty strings count as a hit.
fn lookup<'a>(tree: &'a Value, key: &str) -> Option<&'a str> {
    key.split('.')
        .try_fold(tree, |node, part| node.get(part))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Right-biased merge of `overlay` into `base`. Objects merge recursively;
/// empty overlay strings leave the base value in place.
fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None if is_blank(value) => {}
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (_, overlay) if is_blank(overlay) => {}
        (base, overlay) => *base = overlay.clone(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
