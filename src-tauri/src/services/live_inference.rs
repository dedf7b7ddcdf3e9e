use crate::error::AppError;
use crate::models::classify_types::LivePrediction;
use crate::services::camera::Frame;
use crate::services::classifier::inference::confidence_percent;
use crate::services::classifier::Classifier;
use crate::services::model_registry::ModelDescriptor;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, warn};

/// Continuous classification of live camera frames with the selected model.
pub struct LiveInference<C> {
    classifier: Arc<C>,
    selected: RwLock<ModelDescriptor>,
    latest: Mutex<Option<LivePrediction>>,
}

impl<C: Classifier> LiveInference<C> {
    pub fn new(classifier: Arc<C>, model: ModelDescriptor) -> Self {
        Self {
            classifier,
            selected: RwLock::new(model),
            latest: Mutex::new(None),
        }
    }

    pub fn selected(&self) -> ModelDescriptor {
        *self.selected.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn select_model(&self, model: ModelDescriptor) {
        *self.selected.write().unwrap_or_else(PoisonError::into_inner) = model;
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn latest(&self) -> Option<LivePrediction> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Classifies one frame. The frame is released when this returns, whatever the outcome.
    pub fn process(&self, frame: Frame) -> Result<LivePrediction, AppError> {
        let model = self.selected();
        let result = self.classifier.classify(&model, &frame, 1);
        let sequence = frame.sequence();
        drop(frame);

        let classification = result.map_err(|e| {
            warn!(model = model.id, sequence, "live inference failed: {}", e);
            e
        })?;
        let top = classification
            .top()
            .ok_or_else(|| AppError::new(format!("Model {} returned no predictions", model.id)))?;

        let prediction = LivePrediction {
            model_id: model.id.to_string(),
            label: top.class_name.clone(),
            confidence_percent: confidence_percent(top.confidence),
            metrics: classification.metrics,
        };
        debug!(model = model.id, sequence, label = %prediction.label, "live prediction");

        // A model switch while this frame was in flight makes the result stale.
        if self.selected().id == model.id {
            *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(prediction.clone());
        }
        Ok(prediction)
    }
}
