#![allow(dead_code)]

use camera_classifier_lib::error::AppError;
use camera_classifier_lib::models::classify_types::{Classification, InferenceMetrics, Prediction};
use camera_classifier_lib::services::classifier::Classifier;
use camera_classifier_lib::services::model_registry::{self, ModelDescriptor};
use camera_classifier_lib::services::screen::CameraScreen;
use image::{DynamicImage, Rgb, RgbImage};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Records every call and answers `<model id>-label` with a fixed confidence.
pub struct MockClassifier {
    pub calls: Mutex<Vec<&'static str>>,
    pub ready: AtomicBool,
    pub fail_on: Mutex<Option<&'static str>>,
    pub confidence: f32,
    held: Mutex<bool>,
    released: Condvar,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            ready: AtomicBool::new(true),
            fail_on: Mutex::new(None),
            confidence: 0.87654,
            held: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_on(&self, id: &'static str) {
        *self.fail_on.lock().unwrap() = Some(id);
    }

    /// Makes every `classify` call block after recording itself, until [`Self::release`].
    pub fn hold(&self) {
        *self.held.lock().unwrap() = true;
    }

    pub fn release(&self) {
        *self.held.lock().unwrap() = false;
        self.released.notify_all();
    }
}

impl Classifier for MockClassifier {
    fn is_ready(&self, _model: &ModelDescriptor) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn classify(
        &self,
        model: &ModelDescriptor,
        _image: &DynamicImage,
        _top_k: usize,
    ) -> Result<Classification, AppError> {
        self.calls.lock().unwrap().push(model.id);
        let mut held = self.held.lock().unwrap();
        while *held {
            held = self.released.wait(held).unwrap();
        }
        drop(held);
        if *self.fail_on.lock().unwrap() == Some(model.id) {
            return Err(AppError::new("session crashed"));
        }
        Ok(Classification {
            predictions: vec![Prediction {
                class_name: format!("{}-label", model.id),
                confidence: self.confidence,
            }],
            metrics: InferenceMetrics::default(),
        })
    }
}

pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("camera-classifier-it-{}", uuid::Uuid::new_v4()))
}

pub fn photo() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(48, 64, Rgb([120, 80, 40])))
}

pub fn screen(classifier: Arc<MockClassifier>) -> CameraScreen<MockClassifier> {
    let capture = model_registry::capture_models(&model_registry::default_capture_ids()).unwrap();
    CameraScreen::new(classifier, *model_registry::default_live(), capture, scratch_dir(), 2)
}
