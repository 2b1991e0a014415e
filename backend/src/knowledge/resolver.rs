use shared::DiagnosisRecord;

use crate::error::{DiagnosisError, StartupError};
use crate::model::ClassLabels;

use super::table::{DiseaseEntry, KnowledgeTable};

/// Whether the table had the predicted key or the default record stood in.
/// Both carry a complete record; tests and logs tell them apart.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(DiagnosisRecord),
    Default(DiagnosisRecord),
}

impl Resolution {
    pub fn record(&self) -> &DiagnosisRecord {
        match self {
            Resolution::Found(record) | Resolution::Default(record) => record,
        }
    }

    pub fn into_record(self) -> DiagnosisRecord {
        match self {
            Resolution::Found(record) | Resolution::Default(record) => record,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Resolution::Default(_))
    }
}

/// Health is read off the key name: any key containing "healthy" (any case)
/// is a healthy class. New label vocabularies have to keep this convention.
pub fn is_healthy_key(key: &str) -> bool {
    key.to_lowercase().contains("healthy")
}

/// Turns a class index into localized remediation text.
#[derive(Debug, Clone)]
pub struct DiagnosisResolver {
    labels: ClassLabels,
    table: KnowledgeTable,
}

impl DiagnosisResolver {
    pub fn new(labels: ClassLabels, table: KnowledgeTable) -> Result<Self, StartupError> {
        if table.fallback().is_none() {
            return Err(StartupError::Knowledge(format!(
                "fallback entry '{}' is missing",
                table.fallback_key()
            )));
        }
        for key in labels.iter().filter(|key| !table.contains(key)) {
            log::warn!(
                "Class '{}' has no knowledge entry; '{}' will be reported instead",
                key,
                table.fallback_key()
            );
        }
        Ok(Self { labels, table })
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    pub fn table(&self) -> &KnowledgeTable {
        &self.table
    }

    /// Index must come from a classifier whose width matched the label list
    /// at startup; anything else is an internal inconsistency.
    pub fn resolve_index(&self, index: usize, locale: &str) -> Result<Resolution, DiagnosisError> {
        let key = self.labels.get(index).ok_or_else(|| {
            DiagnosisError::Internal(format!(
                "class index {} outside label list of {}",
                index,
                self.labels.len()
            ))
        })?;
        self.resolve(key, locale)
    }

    pub fn resolve(&self, key: &str, locale: &str) -> Result<Resolution, DiagnosisError> {
        if let Some(entry) = self.table.get(key) {
            return Ok(Resolution::Found(build_record(key, entry, locale)));
        }

        let fallback_key = self.table.fallback_key();
        log::warn!("No knowledge entry for '{}', using '{}'", key, fallback_key);
        let entry = self.table.fallback().ok_or_else(|| {
            DiagnosisError::Internal(format!("fallback entry '{}' vanished", fallback_key))
        })?;
        Ok(Resolution::Default(build_record(fallback_key, entry, locale)))
    }
}

fn build_record(key: &str, entry: &DiseaseEntry, locale: &str) -> DiagnosisRecord {
    DiagnosisRecord {
        disease_key: key.to_string(),
        name: entry.name.get(locale).clone(),
        solution: entry.solution.get(locale).clone(),
        prevention_tips: entry.prevention.get(locale).clone(),
        is_healthy: is_healthy_key(key),
    }
}
