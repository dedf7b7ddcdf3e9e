mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

use config::AppConfig;
use services::classifier::model_manager::ModelManager;
use services::classifier::OrtClassifier;
use services::screen::CameraScreen;
use std::sync::Arc;
use tauri::{Manager, WindowEvent};
use tracing::info;

pub(crate) type Screen = CameraScreen<OrtClassifier>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,camera_classifier_lib=info")),
        )
        .with_target(true)
        .with_level(true)
        .try_init();
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    init_tracing();

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_window_state::Builder::default().build())
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir()?;
            std::fs::create_dir_all(&app_data_dir)?;

            let config = AppConfig::load_validated(&app.path().app_config_dir()?);

            let model_manager = ModelManager::new(config.model_dir(&app_data_dir), config.use_gpu);
            let classifier = Arc::new(OrtClassifier::new(model_manager.clone()));
            let screen: Screen = CameraScreen::new(
                classifier,
                config.live_descriptor()?,
                config.capture_descriptors()?,
                config.capture_dir(),
                config.frame_pool_size,
            );
            let preload = config.preload_descriptors()?;

            info!(
                model_dir = %model_manager.model_dir.display(),
                capture_dir = %config.capture_dir().display(),
                "camera screen ready"
            );

            app.manage(model_manager);
            app.manage(screen);
            app.manage(config);

            // Models must be downloaded and loaded before the screen is interactive.
            commands::models::spawn_preload(app.handle().clone(), preload);

            Ok(())
        })
        .on_window_event(|window, event| {
            if let WindowEvent::Destroyed = event {
                window.state::<Screen>().teardown();
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::camera::get_screen,
            commands::camera::camera_settings,
            commands::camera::process_frame,
            commands::camera::capture_photo,
            commands::camera::return_to_preview,
            commands::camera::press_back,
            commands::camera::confirm_quit,
            commands::camera::cancel_quit,
            commands::camera::submit_result,
            commands::models::list_models,
            commands::models::select_model,
            commands::models::get_model_status,
            commands::models::preload_models,
            commands::models::open_info_link,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
