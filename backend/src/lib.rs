//! Leaf photograph in, localized plant-disease diagnosis out.
//!
//! Startup builds one immutable [`DiagnosisContext`] (classifier weights, class
//! labels, knowledge table). Each request then runs, in order: validation,
//! contrast enhancement, leaf-region isolation, tensor preparation,
//! classification and diagnosis resolution.

pub mod config;
pub mod error;
pub mod knowledge;
pub mod model;
pub mod pipeline;
pub mod processing;

pub use config::AppConfig;
pub use error::{DiagnosisError, InferenceError, StartupError};
pub use knowledge::Resolution;
pub use pipeline::{Diagnosis, DiagnosisContext, Stage, StageObserver};
pub use shared::{DiagnosisRecord, DiagnosisResponse, ErrorResponse, RejectionReason};
