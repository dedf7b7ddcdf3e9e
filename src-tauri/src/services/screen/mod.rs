pub mod machine;

use crate::error::AppError;
use crate::models::classify_types::{ClassificationResult, LivePrediction};
use crate::models::screen_types::ScreenView;
use crate::services::camera::{self, Frame, FramePool};
use crate::services::classifier::inference::confidence_percent;
use crate::services::classifier::Classifier;
use crate::services::live_inference::LiveInference;
use crate::services::model_registry::{self, ModelDescriptor};
use image::DynamicImage;
use machine::{BackOutcome, QuitDecision, ScreenMachine};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FrameOutcome {
    /// Not in live preview; the frame was released untouched.
    Dropped,
    /// Every frame slot was busy.
    Skipped,
    ModelNotReady,
    Classified(LivePrediction),
    Failed(String),
}

/// The camera screen: live preview with continuous inference, capture, and
/// the result view for the fixed capture models.
pub struct CameraScreen<C> {
    machine: Mutex<ScreenMachine>,
    live: Arc<LiveInference<C>>,
    classifier: Arc<C>,
    capture_models: Arc<Vec<ModelDescriptor>>,
    capture_dir: PathBuf,
    frames: FramePool,
}

impl<C: Classifier + 'static> CameraScreen<C> {
    pub fn new(
        classifier: Arc<C>,
        live_model: ModelDescriptor,
        capture_models: Vec<ModelDescriptor>,
        capture_dir: PathBuf,
        frame_pool_size: usize,
    ) -> Self {
        Self {
            machine: Mutex::new(ScreenMachine::new()),
            live: Arc::new(LiveInference::new(Arc::clone(&classifier), live_model)),
            classifier,
            capture_models: Arc::new(capture_models),
            capture_dir,
            frames: FramePool::new(frame_pool_size),
        }
    }

    fn machine(&self) -> MutexGuard<'_, ScreenMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn frame_pool(&self) -> &FramePool {
        &self.frames
    }

    pub fn capture_models(&self) -> &[ModelDescriptor] {
        &self.capture_models
    }

    pub fn selected_model(&self) -> ModelDescriptor {
        self.live.selected()
    }

    pub fn view(&self) -> ScreenView {
        let machine = self.machine();
        ScreenView {
            mode: machine.screen_mode(),
            image_path: machine.image_path().to_string(),
            image_uri: machine.image_uri().to_string(),
            status: machine.result_status(),
            results: machine.results().to_vec(),
            error: machine.error().map(str::to_string),
            quit_prompt: machine.quit_prompt(),
            selected_model: self.live.selected().id.to_string(),
            live_prediction: self.live.latest(),
        }
    }

    /// Takes a frame slot for `image` and runs it through [`Self::handle_frame`].
    pub async fn submit_frame(&self, image: DynamicImage) -> FrameOutcome {
        match self.frames.acquire(image) {
            Some(frame) => self.handle_frame(frame).await,
            None => FrameOutcome::Skipped,
        }
    }

    pub async fn handle_frame(&self, frame: Frame) -> FrameOutcome {
        if !self.machine().accepts_frames() {
            debug!(sequence = frame.sequence(), "dropping frame outside live preview");
            return FrameOutcome::Dropped;
        }
        if !self.classifier.is_ready(&self.live.selected()) {
            return FrameOutcome::ModelNotReady;
        }

        let live = Arc::clone(&self.live);
        match tokio::task::spawn_blocking(move || live.process(frame)).await {
            Ok(Ok(prediction)) => FrameOutcome::Classified(prediction),
            Ok(Err(e)) => FrameOutcome::Failed(e.message),
            Err(e) => FrameOutcome::Failed(format!("Frame task failed: {}", e)),
        }
    }

    /// Saves the photo, enters the captured state and runs the capture models
    /// over it one after another.
    pub async fn capture(&self, image: DynamicImage) -> Result<ScreenView, AppError> {
        if !self.capture_models.iter().all(|m| self.classifier.is_ready(m)) {
            return Err("Models are still loading".into());
        }
        if !self.machine().accepts_frames() {
            return Err("Capture is only available in live preview".into());
        }

        let dir = self.capture_dir.clone();
        let image = Arc::new(image);
        let to_save = Arc::clone(&image);
        let photo = tokio::task::spawn_blocking(move || camera::save_capture(&dir, &to_save)).await??;
        info!(path = %photo.path.display(), "photo captured");

        let ticket = self
            .machine()
            .begin_capture(photo.path.to_string_lossy(), photo.uri.clone())?;

        let classifier = Arc::clone(&self.classifier);
        let models = Arc::clone(&self.capture_models);
        let outcome = tokio::task::spawn_blocking(move || classify_capture(&*classifier, &models, &image))
            .await
            .map_err(AppError::from)
            .and_then(|r| r)
            .map_err(|e| {
                error!("capture classification failed: {}", e);
                e.message
            });

        if !self.machine().complete_capture(ticket, outcome) {
            debug!("capture was abandoned before classification finished");
        }
        Ok(self.view())
    }

    pub fn return_to_preview(&self) -> ScreenView {
        self.machine().return_to_preview();
        self.view()
    }

    pub fn back_pressed(&self) -> BackOutcome {
        self.machine().back_pressed()
    }

    pub fn confirm_quit(&self) -> QuitDecision {
        let decision = self.machine().confirm_quit();
        if decision == QuitDecision::Exit {
            info!("quit confirmed");
        }
        decision
    }

    pub fn cancel_quit(&self) -> ScreenView {
        self.machine().cancel_quit();
        self.view()
    }

    /// Switches the live model only; capture models and screen mode are untouched.
    pub fn select_model(&self, id: &str) -> Result<ScreenView, AppError> {
        let model = model_registry::resolve(id)?;
        self.live.select_model(*model);
        info!(model = model.id, "live model selected");
        Ok(self.view())
    }

    pub fn submit(&self) -> ScreenView {
        info!("submit pressed");
        self.view()
    }

    pub fn teardown(&self) {
        self.machine().teardown();
    }
}

fn classify_capture<C: Classifier + ?Sized>(
    classifier: &C,
    models: &[ModelDescriptor],
    image: &DynamicImage,
) -> Result<Vec<ClassificationResult>, AppError> {
    models
        .iter()
        .map(|model| {
            let classification = classifier
                .classify(model, image, 1)
                .map_err(|e| e.context(format!("{} failed", model.name)))?;
            let top = classification
                .top()
                .ok_or_else(|| AppError::new(format!("{} returned no predictions", model.name)))?;
            Ok(ClassificationResult {
                model_id: model.id.to_string(),
                model_name: model.name.to_string(),
                label: top.class_name.clone(),
                confidence_percent: confidence_percent(top.confidence),
                metrics: classification.metrics,
            })
        })
        .collect()
}
