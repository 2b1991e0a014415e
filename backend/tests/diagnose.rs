use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use leafdoc::model::Network;
use leafdoc::{
    AppConfig, DiagnosisContext, DiagnosisError, InferenceError, RejectionReason, Resolution, Stage,
    StageObserver, StartupError,
};
use ndarray::Array4;

const TOMATO_HEALTHY: usize = 14;
const POTATO_LATE_BLIGHT: usize = 3;

/// Always favours one class; counts how often it was asked.
struct FixedClass {
    index: usize,
    width: usize,
    calls: Arc<AtomicUsize>,
}

impl Network for FixedClass {
    fn forward(&self, _input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut logits = vec![0.0; self.width];
        logits[self.index] = 6.0;
        Ok(logits)
    }

    fn output_dim(&self) -> usize {
        self.width
    }
}

#[derive(Default)]
struct Recorder(Vec<Stage>);

impl StageObserver for Recorder {
    fn stage_completed(&mut self, stage: Stage, _elapsed: Duration) {
        self.0.push(stage);
    }
}

fn config() -> AppConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../config/leafdoc.yaml");
    AppConfig::load(&path).unwrap()
}

fn context(index: usize) -> (DiagnosisContext, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let network = FixedClass {
        index,
        width: 15,
        calls: calls.clone(),
    };
    let context = DiagnosisContext::with_network(&config(), Box::new(network)).unwrap();
    (context, calls)
}

/// Green ellipse on brown soil.
fn synthetic_leaf(width: u32, height: u32) -> RgbImage {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let (rx, ry) = (width as f32 * 0.3, height as f32 * 0.2);
    RgbImage::from_fn(width, height, |x, y| {
        let dx = (x as f32 - cx) / rx;
        let dy = (y as f32 - cy) / ry;
        if dx * dx + dy * dy <= 1.0 {
            Rgb([50, 150, 60])
        } else {
            Rgb([110, 85, 60])
        }
    })
}

fn png_bytes(image: RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

#[test]
fn healthy_leaf_runs_every_stage() {
    let (context, calls) = context(TOMATO_HEALTHY);
    let mut recorder = Recorder::default();

    let diagnosis = context
        .diagnose_observed(synthetic_leaf(300, 300), Some("en"), &mut recorder)
        .unwrap();

    assert!(matches!(diagnosis.resolution, Resolution::Found(_)));
    let record = diagnosis.resolution.record();
    assert_eq!(record.disease_key, "Tomato_healthy");
    assert!(record.is_healthy);
    assert_eq!(record.name, "Healthy Tomato");
    assert_eq!(record.solution, "No action needed");
    assert!(record.prevention_tips.is_empty());

    assert_eq!(diagnosis.classification.class_index, TOMATO_HEALTHY);
    let total: f32 = diagnosis.classification.probabilities.iter().sum();
    assert!((total - 1.0).abs() < 1e-4);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        recorder.0,
        vec![
            Stage::Validate,
            Stage::Enhance,
            Stage::DetectRegion,
            Stage::Preprocess,
            Stage::Classify,
            Stage::Resolve
        ]
    );
}

#[test]
fn tiny_image_is_rejected_before_any_later_stage() {
    let (context, calls) = context(TOMATO_HEALTHY);
    let mut recorder = Recorder::default();

    let err = context
        .diagnose_observed(synthetic_leaf(80, 80), None, &mut recorder)
        .unwrap_err();

    match &err {
        DiagnosisError::Validation(failure) => assert_eq!(failure.reason, RejectionReason::TooSmall),
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(recorder.0.is_empty());

    let response = err.to_response();
    assert_eq!(response.reason, Some(RejectionReason::TooSmall));
    assert_eq!(response.message, "Image is too small. Please upload a larger image.");
}

#[test]
fn dark_image_is_rejected_without_inference() {
    let (context, calls) = context(TOMATO_HEALTHY);
    let dark = RgbImage::from_pixel(400, 300, Rgb([5, 8, 4]));
    let err = context.diagnose(dark, None).unwrap_err();
    assert!(matches!(err, DiagnosisError::Validation(ref f) if f.reason == RejectionReason::TooDark));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn undecodable_upload_is_an_input_error() {
    let (context, calls) = context(TOMATO_HEALTHY);
    let err = context.diagnose_bytes(b"definitely not an image", None).unwrap_err();
    assert!(matches!(err, DiagnosisError::Input(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let response = err.to_response();
    assert!(!response.success);
    assert_eq!(response.message, "Error analyzing image");
    assert_eq!(response.reason, None);
}

#[test]
fn encoded_upload_is_localized() {
    let (context, _) = context(POTATO_LATE_BLIGHT);
    let bytes = png_bytes(synthetic_leaf(320, 240));

    let diagnosis = context.diagnose_bytes(&bytes, Some("hi")).unwrap();
    let response = diagnosis.to_response();
    assert!(response.success);
    assert!(!response.is_healthy);
    assert_eq!(response.disease, "आलू लेट ब्लाइट");
    assert_eq!(response.prevention_tips, vec!["ऊपरी सिंचाई से बचें".to_string()]);
    assert!(response.confidence > 50.0 && response.confidence <= 100.0);

    let diagnosis = context.diagnose_bytes(&bytes, Some("xx")).unwrap();
    assert_eq!(diagnosis.to_response().disease, "Potato Late Blight");
}

#[test]
fn missing_locale_uses_configured_default() {
    let (context, _) = context(POTATO_LATE_BLIGHT);
    let diagnosis = context.diagnose(synthetic_leaf(300, 300), Some("  ")).unwrap();
    assert_eq!(diagnosis.resolution.record().name, "Potato Late Blight");
}

#[test]
fn network_width_must_match_labels_at_startup() {
    let network = FixedClass {
        index: 0,
        width: 14,
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let err = DiagnosisContext::with_network(&config(), Box::new(network)).unwrap_err();
    assert!(matches!(err, StartupError::LabelMismatch { labels: 15, outputs: 14 }));
}

#[test]
fn configured_class_count_must_match_labels() {
    let mut config = config();
    config.model.num_classes = Some(12);
    let network = FixedClass {
        index: 0,
        width: 15,
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let err = DiagnosisContext::with_network(&config, Box::new(network)).unwrap_err();
    assert!(matches!(
        err,
        StartupError::ClassCountMismatch { configured: 12, labels: 15 }
    ));
    assert_eq!(
        err.to_string(),
        "Configured num_classes is 12 but the label list has 15 entries"
    );
}

#[test]
fn context_is_shared_read_only_across_threads() {
    let (context, calls) = context(TOMATO_HEALTHY);
    let context = Arc::new(context);

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let context = Arc::clone(&context);
            std::thread::spawn(move || {
                let image = synthetic_leaf(200 + i * 40, 240);
                context.diagnose(image, Some("en")).map(|d| d.resolution.into_record())
            })
        })
        .collect();

    for handle in handles {
        let record = handle.join().unwrap().unwrap();
        assert_eq!(record.disease_key, "Tomato_healthy");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
