use crate::models::classify_types::{ClassificationResult, LivePrediction};
use serde::Serialize;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScreenMode {
    LivePreview,
    Captured,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    None,
    Pending,
    Ready,
    Failed,
}

/// What the frontend renders after every transition.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ScreenView {
    pub mode: ScreenMode,
    pub image_path: String,
    pub image_uri: String,
    pub status: ResultStatus,
    pub results: Vec<ClassificationResult>,
    pub error: Option<String>,
    pub quit_prompt: bool,
    pub selected_model: String,
    pub live_prediction: Option<LivePrediction>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct CameraSettings {
    pub target_width: u32,
    pub target_height: u32,
    pub capture_button_visible: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub selected: bool,
    pub capture: bool,
}
