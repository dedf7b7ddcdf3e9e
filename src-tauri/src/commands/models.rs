use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::classify_types::ModelStatus;
use crate::models::screen_types::{ModelInfo, ScreenView};
use crate::services::classifier::model_manager::{ModelManager, PreloadObserver, PreloadStage};
use crate::services::model_registry::{self, ModelDescriptor};
use crate::Screen;
use tauri::{AppHandle, Emitter, Manager, State};
use tauri_plugin_opener::OpenerExt;
use tracing::error;

/// Forwards preload progress to the frontend.
struct EventObserver {
    app: AppHandle,
}

impl PreloadObserver for EventObserver {
    fn stage(&self, model: &ModelDescriptor, stage: PreloadStage) {
        let _ = self.app.emit(
            "model-preload",
            serde_json::json!({ "status": stage.as_str(), "model": model.id }),
        );
    }

    fn download_progress(&self, model: &ModelDescriptor, percent: u64) {
        let _ = self.app.emit(
            "download-progress",
            serde_json::json!({ "model": model.id, "progress": percent }),
        );
    }
}

/// Downloads and loads `models` in the background.
pub(crate) fn spawn_preload(app: AppHandle, models: Vec<ModelDescriptor>) {
    tauri::async_runtime::spawn(async move {
        let manager = app.state::<ModelManager>().inner().clone();
        let observer = EventObserver { app: app.clone() };
        if let Err(e) = manager.preload(&models, &observer).await {
            error!("Preload: {}", e);
            let _ = app.emit(
                "model-preload",
                serde_json::json!({ "status": "error", "error": e.message }),
            );
        }
    });
}

#[tauri::command]
pub fn list_models(screen: State<'_, Screen>) -> Vec<ModelInfo> {
    let selected = screen.selected_model();
    model_registry::MODELS
        .iter()
        .map(|m| ModelInfo {
            id: m.id.to_string(),
            name: m.name.to_string(),
            selected: m.id == selected.id,
            capture: screen.capture_models().iter().any(|c| c.id == m.id),
        })
        .collect()
}

fn required_models(screen: &Screen) -> Vec<ModelDescriptor> {
    let mut models = vec![screen.selected_model()];
    for model in screen.capture_models() {
        if !models.iter().any(|m| m.id == model.id) {
            models.push(*model);
        }
    }
    models
}

#[tauri::command]
pub fn select_model(
    app: AppHandle,
    screen: State<'_, Screen>,
    model_manager: State<'_, ModelManager>,
    model_id: String,
) -> Result<ScreenView, AppError> {
    let view = screen.select_model(&model_id)?;
    let selected = screen.selected_model();
    if !model_manager.is_ready(&selected) {
        spawn_preload(app.clone(), vec![selected]);
    }
    super::camera::emit_view(&app, &view);
    Ok(view)
}

#[tauri::command]
pub async fn get_model_status(
    model_manager: State<'_, ModelManager>,
    screen: State<'_, Screen>,
) -> Result<ModelStatus, AppError> {
    Ok(model_manager.status(&required_models(&screen)).await)
}

#[tauri::command]
pub fn preload_models(app: AppHandle, screen: State<'_, Screen>) -> Result<(), AppError> {
    // Queues behind any preload already running.
    spawn_preload(app.clone(), required_models(&screen));
    Ok(())
}

#[tauri::command]
pub fn open_info_link(app: AppHandle, config: State<'_, AppConfig>) -> Result<(), AppError> {
    app.opener()
        .open_url(&config.info_url, None::<&str>)
        .map_err(|e| AppError::new(format!("Failed to open {}: {}", config.info_url, e)))
}
