pub mod inference;
pub mod model_manager;

use crate::error::AppError;
use crate::models::classify_types::Classification;
use crate::services::model_registry::ModelDescriptor;
use image::DynamicImage;
use model_manager::ModelManager;
use std::sync::PoisonError;

/// Runs one image through one model.
pub trait Classifier: Send + Sync {
    fn is_ready(&self, model: &ModelDescriptor) -> bool;

    fn classify(
        &self,
        model: &ModelDescriptor,
        image: &DynamicImage,
        top_k: usize,
    ) -> Result<Classification, AppError>;
}

/// ONNX Runtime classifier over the sessions held by a [`ModelManager`].
#[derive(Clone)]
pub struct OrtClassifier {
    manager: ModelManager,
}

impl OrtClassifier {
    pub fn new(manager: ModelManager) -> Self {
        Self { manager }
    }
}

impl Classifier for OrtClassifier {
    fn is_ready(&self, model: &ModelDescriptor) -> bool {
        self.manager.is_ready(model)
    }

    fn classify(
        &self,
        model: &ModelDescriptor,
        image: &DynamicImage,
        top_k: usize,
    ) -> Result<Classification, AppError> {
        let loaded = self
            .manager
            .get(model)
            .ok_or_else(|| AppError::new(format!("Model {} not loaded", model.id)))?;
        let mut session = loaded.session.lock().unwrap_or_else(PoisonError::into_inner);
        inference::classify_with_session(&mut session, model, image, &loaded.labels, top_k)
    }
}
