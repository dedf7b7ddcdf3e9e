use crate::error::AppError;
use crate::models::classify_types::ModelStatus;
use crate::services::labels::LabelTable;
use crate::services::model_registry::ModelDescriptor;
use futures::StreamExt;
use ort::session::Session;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{info, warn};

/// A loaded model: its session is used by one caller at a time.
pub struct LoadedModel {
    pub session: Mutex<Session>,
    pub labels: Arc<LabelTable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadStage {
    Downloading,
    Loading,
    Ready,
}

impl PreloadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreloadStage::Downloading => "downloading",
            PreloadStage::Loading => "loading",
            PreloadStage::Ready => "ready",
        }
    }
}

/// Progress notifications from downloads and preloading.
pub trait PreloadObserver: Send + Sync {
    fn stage(&self, model: &ModelDescriptor, stage: PreloadStage);
    fn download_progress(&self, model: &ModelDescriptor, percent: u64);
}

#[derive(Clone)]
pub struct ModelManager {
    pub model_dir: PathBuf,
    use_gpu: bool,
    models: Arc<RwLock<HashMap<&'static str, Arc<LoadedModel>>>>,
    /// Held for the whole of one preload; later preloads queue behind it.
    preload_gate: Arc<tokio::sync::Mutex<()>>,
    /// Preloads running or waiting for the gate.
    pending: Arc<AtomicUsize>,
    error: Arc<Mutex<Option<String>>>,
}

impl ModelManager {
    pub fn new(model_dir: PathBuf, use_gpu: bool) -> Self {
        Self {
            model_dir,
            use_gpu,
            models: Arc::new(RwLock::new(HashMap::new())),
            preload_gate: Arc::new(tokio::sync::Mutex::new(())),
            pending: Arc::new(AtomicUsize::new(0)),
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn model_path(&self, model: &ModelDescriptor) -> PathBuf {
        self.model_dir.join(model.model_file())
    }

    pub fn config_path(&self, model: &ModelDescriptor) -> PathBuf {
        self.model_dir.join(model.config_file())
    }

    pub fn is_downloaded(&self, model: &ModelDescriptor) -> bool {
        self.model_path(model).exists() && self.config_path(model).exists()
    }

    pub fn is_ready(&self, model: &ModelDescriptor) -> bool {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(model.id)
    }

    pub fn is_loading(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    pub fn error(&self) -> Option<String> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_error(&self, error: Option<String>) {
        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    pub fn get(&self, model: &ModelDescriptor) -> Option<Arc<LoadedModel>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model.id)
            .cloned()
    }

    pub async fn status(&self, models: &[ModelDescriptor]) -> ModelStatus {
        ModelStatus {
            downloaded: models.iter().all(|m| self.is_downloaded(m)),
            loading: self.is_loading(),
            ready: models.iter().all(|m| self.is_ready(m)),
            error: self.error(),
        }
    }

    pub async fn download_model(
        &self,
        model: &ModelDescriptor,
        observer: &dyn PreloadObserver,
    ) -> Result<(), AppError> {
        if self.is_downloaded(model) {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.model_dir)
            .await
            .map_err(|e| AppError::new(format!("Failed to create model directory: {}", e)))?;

        let config_path = self.config_path(model);
        if !config_path.exists() {
            download_file(&model.config_url(), &config_path, |_| {}).await?;
        }

        let model_path = self.model_path(model);
        if !model_path.exists() {
            download_file(&model.model_url(), &model_path, |p| {
                observer.download_progress(model, p)
            })
            .await?;
        }

        info!(model = model.id, "model downloaded");
        Ok(())
    }

    pub async fn load_model(&self, model: &ModelDescriptor) -> Result<(), AppError> {
        if self.is_ready(model) {
            return Ok(());
        }
        if !self.is_downloaded(model) {
            return Err(format!("Model {} not downloaded. Call download_model first.", model.id).into());
        }

        let config_path = self.config_path(model);
        let config_content = tokio::fs::read_to_string(&config_path).await.map_err(|e| {
            AppError::new(format!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let labels = LabelTable::from_config_json(&config_content)?;
        let label_count = labels.len();

        let model_path = self.model_path(model);
        let use_gpu = self.use_gpu;
        let session = tokio::task::spawn_blocking(move || build_session(&model_path, use_gpu))
            .await
            .map_err(|e| AppError::new(format!("Failed to spawn model loading task: {}", e)))??;

        self.models
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                model.id,
                Arc::new(LoadedModel {
                    session: Mutex::new(session),
                    labels: Arc::new(labels),
                }),
            );

        info!(model = model.id, labels = label_count, "model loaded");
        Ok(())
    }

    /// Downloads and loads every model in order, stopping at the first failure.
    /// Preloads run one at a time; a call made while another is in flight
    /// waits for it and then loads its own models.
    pub async fn preload(
        &self,
        models: &[ModelDescriptor],
        observer: &dyn PreloadObserver,
    ) -> Result<(), AppError> {
        let _pending = PendingPreload::enter(&self.pending);
        let result = {
            let _gate = self.preload_gate.lock().await;
            self.set_error(None);
            self.do_preload(models, observer).await
        };

        if let Err(ref e) = result {
            warn!("Preload failed: {}", e);
            self.set_error(Some(e.message.clone()));
        }
        result
    }

    async fn do_preload(
        &self,
        models: &[ModelDescriptor],
        observer: &dyn PreloadObserver,
    ) -> Result<(), AppError> {
        for model in models {
            if self.is_ready(model) {
                observer.stage(model, PreloadStage::Ready);
                continue;
            }
            if !self.is_downloaded(model) {
                observer.stage(model, PreloadStage::Downloading);
                self.download_model(model, observer)
                    .await
                    .map_err(|e| e.context(format!("Failed to download {}", model.name)))?;
            }
            observer.stage(model, PreloadStage::Loading);
            self.load_model(model)
                .await
                .map_err(|e| e.context(format!("Failed to load {}", model.name)))?;
            observer.stage(model, PreloadStage::Ready);
        }
        Ok(())
    }
}

/// Counts a preload as pending until it returns or is dropped.
struct PendingPreload<'a>(&'a AtomicUsize);

impl<'a> PendingPreload<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingPreload<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn build_session(model_path: &Path, use_gpu: bool) -> Result<Session, AppError> {
    let _ = ort::init().with_name("camera-classifier").commit();

    let mut builder = Session::builder()
        .map_err(|e| AppError::new(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
        .map_err(|e| AppError::new(format!("Failed to set optimization level: {}", e)))?
        .with_intra_threads(4)
        .map_err(|e| AppError::new(format!("Failed to set intra threads: {}", e)))?;

    if use_gpu {
        builder = builder
            .with_execution_providers([
                ort::execution_providers::DirectMLExecutionProvider::default().build(),
                ort::execution_providers::CoreMLExecutionProvider::default().build(),
                ort::execution_providers::CUDAExecutionProvider::default().build(),
                ort::execution_providers::CPUExecutionProvider::default().build(),
            ])
            .map_err(|e| AppError::new(format!("Failed to register GPU execution providers: {}", e)))?;
    } else {
        builder = builder
            .with_execution_providers([ort::execution_providers::CPUExecutionProvider::default().build()])
            .map_err(|e| AppError::new(format!("Failed to register CPU execution provider: {}", e)))?;
    }

    builder
        .commit_from_file(model_path)
        .map_err(|e| AppError::new(format!("Failed to load ONNX model: {}", e)))
}

async fn download_file(url: &str, dest: &Path, progress: impl Fn(u64)) -> Result<(), AppError> {
    let client = reqwest::Client::new();
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(format!("Failed to download {}: HTTP {}", url, response.status()).into());
    }

    let total_size = response.content_length().unwrap_or(0);
    // Write to a side file so an interrupted download never looks complete.
    let partial = dest.with_extension("part");
    let result = stream_to_file(response, &partial, total_size, &progress).await;
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e);
    }

    finish_download(&partial, dest).await?;
    progress(100);
    Ok(())
}

/// Moves a completed side file into place; the side file never outlives a failed move.
async fn finish_download(partial: &Path, dest: &Path) -> Result<(), AppError> {
    if let Err(e) = tokio::fs::rename(partial, dest).await {
        let _ = tokio::fs::remove_file(partial).await;
        return Err(AppError::new(format!(
            "Failed to move download into place at {}: {}",
            dest.display(),
            e
        )));
    }
    Ok(())
}

async fn stream_to_file(
    response: reqwest::Response,
    path: &Path,
    total_size: u64,
    progress: &impl Fn(u64),
) -> Result<(), AppError> {
    let mut file = tokio::fs::File::create(path).await.map_err(|e| {
        AppError::new(format!("Failed to create file {}: {}", path.display(), e))
    })?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_emit = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        downloaded += chunk.len() as u64;
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
            .await
            .map_err(|e| AppError::new(format!("Failed to write to file: {}", e)))?;

        if total_size > 0 {
            let percent = (downloaded * 100) / total_size;
            if percent > last_emit {
                progress(percent);
                last_emit = percent;
            }
        }
    }
    tokio::io::AsyncWriteExt::flush(&mut file).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::model_registry;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("camera-classifier-models-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn paths_are_derived_from_descriptor() {
        let dir = scratch_dir();
        let manager = ModelManager::new(dir.clone(), false);
        let model = model_registry::resolve("resnet-18").unwrap();
        assert_eq!(manager.model_path(model), dir.join("resnet-18.onnx"));
        assert_eq!(manager.config_path(model), dir.join("resnet-18-config.json"));
    }

    #[tokio::test]
    async fn fresh_manager_reports_nothing_ready() {
        let manager = ModelManager::new(scratch_dir(), false);
        let status = manager.status(&model_registry::MODELS).await;
        assert_eq!(
            status,
            ModelStatus {
                downloaded: false,
                loading: false,
                ready: false,
                error: None,
            }
        );
    }

    #[derive(Default)]
    struct RecordingObserver {
        stages: Mutex<Vec<(&'static str, PreloadStage)>>,
    }

    impl PreloadObserver for RecordingObserver {
        fn stage(&self, model: &ModelDescriptor, stage: PreloadStage) {
            self.stages.lock().unwrap().push((model.id, stage));
        }

        fn download_progress(&self, _model: &ModelDescriptor, _percent: u64) {}
    }

    #[tokio::test]
    async fn preload_started_during_another_waits_and_then_runs() {
        let dir = scratch_dir();
        let manager = ModelManager::new(dir.clone(), false);
        let model = *model_registry::resolve("resnet-50").unwrap();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(manager.model_path(&model), b"onnx").unwrap();
        std::fs::write(manager.config_path(&model), r#"{"num_labels": 1000}"#).unwrap();

        // Stands in for a startup preload that is still running.
        let in_flight = manager.preload_gate.lock().await;

        let observer = Arc::new(RecordingObserver::default());
        let queued = tokio::spawn({
            let manager = manager.clone();
            let observer = Arc::clone(&observer);
            async move { manager.preload(&[model], &*observer).await }
        });
        while !manager.is_loading() {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;
        assert!(!queued.is_finished());
        assert!(observer.stages.lock().unwrap().is_empty());

        drop(in_flight);
        let err = queued.await.unwrap().unwrap_err();

        // The queued preload got to loading its own model rather than being turned away.
        assert_eq!(
            *observer.stages.lock().unwrap(),
            vec![("resnet-50", PreloadStage::Loading)]
        );
        assert!(err.message.contains("id2label"), "{}", err);
        assert!(!manager.is_loading());
        assert_eq!(manager.error(), Some(err.message));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn preload_of_nothing_succeeds_and_clears_loading() {
        let manager = ModelManager::new(scratch_dir(), false);
        let observer = RecordingObserver::default();
        manager.preload(&[], &observer).await.unwrap();
        manager.preload(&[], &observer).await.unwrap();
        assert!(!manager.is_loading());
        assert_eq!(manager.error(), None);
    }

    #[tokio::test]
    async fn failed_move_into_place_removes_the_side_file() {
        let dir = scratch_dir();
        let partial = dir.join("resnet-18.part");
        let dest = dir.join("resnet-18.onnx");
        std::fs::create_dir_all(dest.join("occupied")).unwrap();
        std::fs::write(&partial, b"onnx").unwrap();

        let err = finish_download(&partial, &dest).await.unwrap_err();
        assert!(err.message.contains("resnet-18.onnx"), "{}", err);
        assert!(!partial.exists());
        assert!(dest.join("occupied").is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn loading_a_missing_model_fails_without_touching_state() {
        let manager = ModelManager::new(scratch_dir(), false);
        let model = model_registry::default_live();
        let err = manager.load_model(model).await.unwrap_err();
        assert!(err.message.contains("not downloaded"));
        assert!(!manager.is_ready(model));
    }
}
