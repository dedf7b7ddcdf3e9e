use crate::error::AppError;
use crate::services::model_registry::{self, ModelDescriptor};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CONFIG_FILE: &str = "config.json";

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Model used for the continuous live-preview prediction.
    pub live_model: String,
    /// The models every captured photo is run through, in display order.
    pub capture_models: Vec<String>,
    pub target_width: u32,
    pub target_height: u32,
    /// Maximum number of camera frames in flight at once.
    pub frame_pool_size: usize,
    pub use_gpu: bool,
    pub info_url: String,
    /// Where captured photos are written; defaults to a temp subdirectory.
    pub capture_dir: Option<PathBuf>,
    /// Where downloaded models live; defaults to `<app data>/models`.
    pub model_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            live_model: model_registry::default_live().id.to_string(),
            capture_models: model_registry::default_capture_ids(),
            target_width: 480,
            target_height: 640,
            frame_pool_size: 2,
            use_gpu: true,
            info_url: "https://onnxruntime.ai/docs/".to_string(),
            capture_dir: None,
            model_dir: None,
        }
    }
}

impl AppConfig {
    /// Load from `dir/config.json`, returning defaults if it doesn't exist or is invalid.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Like [`Self::load`], but a config that names unknown models or a zero
    /// resolution is replaced by the defaults instead of failing startup.
    pub fn load_validated(dir: &Path) -> Self {
        let config = Self::load(dir);
        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!("Ignoring config in {}: {}", dir.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, dir: &Path) -> Result<(), AppError> {
        fs::create_dir_all(dir)?;
        let data = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(CONFIG_FILE), data)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        model_registry::resolve(&self.live_model)?;
        model_registry::capture_models(&self.capture_models)?;
        if self.target_width == 0 || self.target_height == 0 {
            return Err("Target resolution must be non-zero".into());
        }
        Ok(())
    }

    pub fn live_descriptor(&self) -> Result<ModelDescriptor, AppError> {
        model_registry::resolve(&self.live_model).copied()
    }

    pub fn capture_descriptors(&self) -> Result<Vec<ModelDescriptor>, AppError> {
        model_registry::capture_models(&self.capture_models)
    }

    /// Live model first, then capture models not already listed.
    pub fn preload_descriptors(&self) -> Result<Vec<ModelDescriptor>, AppError> {
        let mut models = vec![self.live_descriptor()?];
        for model in self.capture_descriptors()? {
            if !models.iter().any(|m| m.id == model.id) {
                models.push(model);
            }
        }
        Ok(models)
    }

    pub fn capture_dir(&self) -> PathBuf {
        self.capture_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("camera-classifier"))
    }

    pub fn model_dir(&self, app_data_dir: &Path) -> PathBuf {
        self.model_dir
            .clone()
            .unwrap_or_else(|| app_data_dir.join("models"))
    }
}
