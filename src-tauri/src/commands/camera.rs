use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::screen_types::{CameraSettings, ScreenView};
use crate::services::camera;
use crate::services::screen::machine::{BackOutcome, QuitDecision};
use crate::services::screen::FrameOutcome;
use crate::Screen;
use tauri::{AppHandle, Emitter, Manager, State};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};
use tracing::debug;

pub(crate) fn emit_view(app: &AppHandle, view: &ScreenView) {
    let _ = app.emit("screen-changed", view);
}

#[tauri::command]
pub fn get_screen(screen: State<'_, Screen>) -> ScreenView {
    screen.view()
}

#[tauri::command]
pub fn camera_settings(config: State<'_, AppConfig>) -> CameraSettings {
    CameraSettings {
        target_width: config.target_width,
        target_height: config.target_height,
        capture_button_visible: true,
    }
}

#[tauri::command]
pub async fn process_frame(screen: State<'_, Screen>, frame: String) -> Result<FrameOutcome, AppError> {
    let image = camera::decode_image(&frame)?;
    let outcome = screen.submit_frame(image).await;
    if let FrameOutcome::Failed(ref e) = outcome {
        debug!("frame failed: {}", e);
    }
    Ok(outcome)
}

#[tauri::command]
pub async fn capture_photo(
    app: AppHandle,
    screen: State<'_, Screen>,
    image: String,
) -> Result<ScreenView, AppError> {
    let image = camera::decode_image(&image)?;
    let view = screen.capture(image).await?;
    emit_view(&app, &view);
    Ok(view)
}

#[tauri::command]
pub fn return_to_preview(app: AppHandle, screen: State<'_, Screen>) -> ScreenView {
    let view = screen.return_to_preview();
    emit_view(&app, &view);
    view
}

#[tauri::command]
pub fn press_back(app: AppHandle, screen: State<'_, Screen>) -> ScreenView {
    if screen.back_pressed() == BackOutcome::QuitPromptShown {
        show_quit_dialog(&app);
    }
    let view = screen.view();
    emit_view(&app, &view);
    view
}

#[tauri::command]
pub fn confirm_quit(app: AppHandle, screen: State<'_, Screen>) {
    if screen.confirm_quit() == QuitDecision::Exit {
        app.exit(0);
    }
}

#[tauri::command]
pub fn cancel_quit(app: AppHandle, screen: State<'_, Screen>) -> ScreenView {
    let view = screen.cancel_quit();
    emit_view(&app, &view);
    view
}

#[tauri::command]
pub fn submit_result(screen: State<'_, Screen>) -> ScreenView {
    screen.submit()
}

fn show_quit_dialog(app: &AppHandle) {
    let handle = app.clone();
    app.dialog()
        .message("Do you really want to quit the app?")
        .title("Quit app?")
        .kind(MessageDialogKind::Warning)
        .buttons(MessageDialogButtons::OkCancelCustom(
            "Quit".to_string(),
            "Cancel".to_string(),
        ))
        .show(move |confirmed| {
            let screen = handle.state::<Screen>();
            if confirmed {
                if screen.confirm_quit() == QuitDecision::Exit {
                    handle.exit(0);
                }
            } else {
                let view = screen.cancel_quit();
                emit_view(&handle, &view);
            }
        });
}
