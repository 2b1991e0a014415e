use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Serialize;
use shared::DiagnosisResponse;
use strum_macros::Display;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{DiagnosisError, StartupError};
use crate::knowledge::{DiagnosisResolver, KnowledgeTable, Resolution};
use crate::model::{ClassLabels, ClassificationResult, Classifier, Network, load_network};
use crate::processing::{ImageEnhancer, ImageValidator, Preprocessor, RegionDetector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    Decode,
    Validate,
    Enhance,
    DetectRegion,
    Preprocess,
    Classify,
    Resolve,
}

/// Notified after each stage that ran to completion.
pub trait StageObserver {
    fn stage_completed(&mut self, stage: Stage, elapsed: Duration);
}

/// Default observer: one debug line per stage.
pub struct LogObserver {
    request_id: Uuid,
}

impl StageObserver for LogObserver {
    fn stage_completed(&mut self, stage: Stage, elapsed: Duration) {
        log::debug!(
            "[{}] {} finished in {:.2} ms",
            self.request_id,
            stage,
            elapsed.as_secs_f64() * 1000.0
        );
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub request_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub classification: ClassificationResult,
    #[serde(serialize_with = "serialize_resolution")]
    pub resolution: Resolution,
}

fn serialize_resolution<S: serde::Serializer>(resolution: &Resolution, s: S) -> Result<S::Ok, S::Error> {
    resolution.record().serialize(s)
}

impl Diagnosis {
    pub fn to_response(&self) -> DiagnosisResponse {
        let record = self.resolution.record();
        DiagnosisResponse {
            success: true,
            disease: record.name.clone(),
            confidence: (self.classification.confidence * 10_000.0).round() / 100.0,
            is_healthy: record.is_healthy,
            organic_solution: record.solution.clone(),
            prevention_tips: record.prevention_tips.clone(),
        }
    }
}

/// Everything loaded once at startup. Immutable afterwards; share it behind an
/// `Arc` when several workers diagnose concurrently.
#[derive(Debug)]
pub struct DiagnosisContext {
    validator: ImageValidator,
    enhancer: ImageEnhancer,
    detector: RegionDetector,
    preprocessor: Preprocessor,
    classifier: Classifier,
    resolver: DiagnosisResolver,
    default_locale: String,
}

impl DiagnosisContext {
    pub fn new(
        classifier: Classifier,
        resolver: DiagnosisResolver,
        validator: ImageValidator,
        default_locale: impl Into<String>,
    ) -> Self {
        Self {
            validator,
            enhancer: ImageEnhancer::default(),
            detector: RegionDetector::default(),
            preprocessor: Preprocessor::default(),
            classifier,
            resolver,
            default_locale: default_locale.into(),
        }
    }

    /// Builds the context from config, loading weights via `load_network`.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let network = load_network(&config.model.path)?;
        Self::with_network(config, network)
    }

    /// Same as `from_config` with an already-constructed network.
    pub fn with_network(config: &AppConfig, network: Box<dyn Network>) -> Result<Self, StartupError> {
        let labels = ClassLabels::load(&config.model.class_labels)?;
        if let Some(expected) = config.model.num_classes {
            if expected != labels.len() {
                return Err(StartupError::ClassCountMismatch {
                    configured: expected,
                    labels: labels.len(),
                });
            }
        }
        log::info!(
            "Loaded {} class labels from {}",
            labels.len(),
            config.model.class_labels.display()
        );

        let knowledge = &config.knowledge;
        let table = match &knowledge.path {
            Some(path) => KnowledgeTable::load(path, &knowledge.supported_locales, &knowledge.fallback_key)?,
            None => KnowledgeTable::builtin(&knowledge.supported_locales, &knowledge.fallback_key)?,
        };
        log::info!(
            "Knowledge table ready: {} entries, locales {:?}",
            table.len(),
            knowledge.supported_locales
        );

        let classifier = Classifier::new(network, &labels)?;
        let resolver = DiagnosisResolver::new(labels, table)?;
        Ok(Self::new(
            classifier,
            resolver,
            ImageValidator::new(config.validation.clone()),
            knowledge.default_locale.clone(),
        ))
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn resolver(&self) -> &DiagnosisResolver {
        &self.resolver
    }

    /// Decodes an uploaded file and diagnoses it.
    pub fn diagnose_bytes(&self, bytes: &[u8], locale: Option<&str>) -> Result<Diagnosis, DiagnosisError> {
        let request_id = Uuid::new_v4();
        self.run(request_id, locale, &mut LogObserver { request_id }, |observer| {
            let started = Instant::now();
            let image = image::load_from_memory(bytes)
                .inspect_err(|e| log::warn!("[{}] Could not decode upload: {}", request_id, e))?
                .to_rgb8();
            observer.stage_completed(Stage::Decode, started.elapsed());
            Ok(image)
        })
    }

    pub fn diagnose(&self, image: RgbImage, locale: Option<&str>) -> Result<Diagnosis, DiagnosisError> {
        let request_id = Uuid::new_v4();
        self.run(request_id, locale, &mut LogObserver { request_id }, |_| Ok(image))
    }

    /// `diagnose` with a caller-supplied observer.
    pub fn diagnose_observed(
        &self,
        image: RgbImage,
        locale: Option<&str>,
        observer: &mut dyn StageObserver,
    ) -> Result<Diagnosis, DiagnosisError> {
        self.run(Uuid::new_v4(), locale, observer, |_| Ok(image))
    }

    fn run(
        &self,
        request_id: Uuid,
        locale: Option<&str>,
        observer: &mut dyn StageObserver,
        source: impl FnOnce(&mut dyn StageObserver) -> Result<RgbImage, DiagnosisError>,
    ) -> Result<Diagnosis, DiagnosisError> {
        let locale = self.locale(locale);
        let image = source(&mut *observer)?;

        let started = Instant::now();
        let stats = self.validator.validate(&image).inspect_err(|failure| {
            log::warn!(
                "[{}] Image validation failed: {} ({}x{}, brightness {:?})",
                request_id,
                failure.reason,
                failure.width,
                failure.height,
                failure.mean_brightness
            );
        })?;
        observer.stage_completed(Stage::Validate, started.elapsed());
        log::debug!(
            "[{}] Accepted {}x{} image, mean brightness {:.1}",
            request_id,
            stats.width,
            stats.height,
            stats.mean_brightness
        );

        let started = Instant::now();
        let enhanced = self.enhancer.enhance(&image);
        drop(image);
        observer.stage_completed(Stage::Enhance, started.elapsed());

        let started = Instant::now();
        let region = self.detector.isolate(enhanced);
        observer.stage_completed(Stage::DetectRegion, started.elapsed());

        let started = Instant::now();
        let tensor = self.preprocessor.prepare(&region);
        observer.stage_completed(Stage::Preprocess, started.elapsed());

        let started = Instant::now();
        let classification = self.classifier.classify(&tensor).inspect_err(|e| {
            log::error!("[{}] Model inference error: {:?}", request_id, e);
        })?;
        observer.stage_completed(Stage::Classify, started.elapsed());

        let started = Instant::now();
        let resolution = self
            .resolver
            .resolve_index(classification.class_index, &locale)
            .inspect_err(|e| log::error!("[{}] {}", request_id, e))?;
        observer.stage_completed(Stage::Resolve, started.elapsed());

        log::info!(
            "[{}] Diagnosed '{}' ({:.2}%, locale {})",
            request_id,
            resolution.record().disease_key,
            classification.confidence * 100.0,
            locale
        );

        Ok(Diagnosis {
            request_id,
            analyzed_at: Utc::now(),
            classification,
            resolution,
        })
    }

    fn locale(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim).filter(|l| !l.is_empty()) {
            Some(locale) => locale.to_lowercase(),
            None => self.default_locale.clone(),
        }
    }
}
