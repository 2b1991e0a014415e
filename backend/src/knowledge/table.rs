use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::StartupError;

/// Every localized field must carry text in this locale; it is what any other
/// locale falls back to.
pub const BASE_LOCALE: &str = "en";

const BUILTIN_TABLE: &str = include_str!("../../data/knowledge.json");

/// A value in the base locale plus any translations.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "BTreeMap<String, T>")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Localized<T> {
    base: T,
    translations: BTreeMap<String, T>,
}

impl<T> TryFrom<BTreeMap<String, T>> for Localized<T> {
    type Error = String;

    fn try_from(mut values: BTreeMap<String, T>) -> Result<Self, Self::Error> {
        let base = values
            .remove(BASE_LOCALE)
            .ok_or_else(|| format!("missing '{}' text", BASE_LOCALE))?;
        Ok(Self {
            base,
            translations: values,
        })
    }
}

impl<T> Localized<T> {
    /// Text for `locale`, or the base-locale text when there is none.
    pub fn get(&self, locale: &str) -> &T {
        if locale == BASE_LOCALE {
            return &self.base;
        }
        self.translations.get(locale).unwrap_or(&self.base)
    }

    pub fn has(&self, locale: &str) -> bool {
        locale == BASE_LOCALE || self.translations.contains_key(locale)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiseaseEntry {
    pub name: Localized<String>,
    pub solution: Localized<String>,
    pub prevention: Localized<Vec<String>>,
}

/// Static disease-key -> remediation text mapping, checked once at startup.
#[derive(Debug, Clone)]
pub struct KnowledgeTable {
    entries: BTreeMap<String, DiseaseEntry>,
    fallback_key: String,
}

impl KnowledgeTable {
    /// The table shipped with the crate.
    pub fn builtin(supported_locales: &[String], fallback_key: &str) -> Result<Self, StartupError> {
        Self::from_json(BUILTIN_TABLE, supported_locales, fallback_key)
            .map_err(|e| StartupError::Knowledge(format!("built-in table: {}", e)))
    }

    pub fn load(
        path: &Path,
        supported_locales: &[String],
        fallback_key: &str,
    ) -> Result<Self, StartupError> {
        let raw = std::fs::read_to_string(path).map_err(|source| StartupError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: BTreeMap<String, DiseaseEntry> =
            serde_json::from_str(&raw).map_err(|source| StartupError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(entries, supported_locales, fallback_key)
    }

    pub fn from_json(
        json: &str,
        supported_locales: &[String],
        fallback_key: &str,
    ) -> Result<Self, StartupError> {
        let entries: BTreeMap<String, DiseaseEntry> = serde_json::from_str(json)
            .map_err(|e| StartupError::Knowledge(format!("invalid table: {}", e)))?;
        Self::new(entries, supported_locales, fallback_key)
    }

    /// Requires the fallback entry and full coverage of `supported_locales`
    /// on every field of every entry.
    pub fn new(
        entries: BTreeMap<String, DiseaseEntry>,
        supported_locales: &[String],
        fallback_key: &str,
    ) -> Result<Self, StartupError> {
        if !entries.contains_key(fallback_key) {
            return Err(StartupError::Knowledge(format!(
                "fallback entry '{}' is missing",
                fallback_key
            )));
        }

        for (key, entry) in &entries {
            for locale in supported_locales {
                let field = if !entry.name.has(locale) {
                    Some("name")
                } else if !entry.solution.has(locale) {
                    Some("solution")
                } else if !entry.prevention.has(locale) {
                    Some("prevention")
                } else {
                    None
                };
                if let Some(field) = field {
                    return Err(StartupError::Knowledge(format!(
                        "'{}' has no '{}' text for {}",
                        key, locale, field
                    )));
                }
            }
        }

        Ok(Self {
            entries,
            fallback_key: fallback_key.to_string(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&DiseaseEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn fallback_key(&self) -> &str {
        &self.fallback_key
    }

    /// The designated default entry. Its presence is checked in `new`.
    pub fn fallback(&self) -> Option<&DiseaseEntry> {
        self.entries.get(&self.fallback_key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
