//! Localized remediation guidance keyed by disease class.

pub mod resolver;
pub mod table;

pub use resolver::{DiagnosisResolver, Resolution, is_healthy_key};
pub use table::{BASE_LOCALE, DiseaseEntry, KnowledgeTable, Localized};
