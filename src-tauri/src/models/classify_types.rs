use serde::Serialize;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelStatus {
    pub downloaded: bool,
    pub loading: bool,
    pub ready: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f32,
}

/// Wall-clock timings of one classification, in milliseconds.
#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq)]
pub struct InferenceMetrics {
    pub pre_processing_ms: f64,
    pub inference_ms: f64,
    pub post_processing_ms: f64,
    pub total_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub predictions: Vec<Prediction>,
    pub metrics: InferenceMetrics,
}

impl Classification {
    pub fn top(&self) -> Option<&Prediction> {
        self.predictions.first()
    }
}

/// One row of the result view: a capture model's best guess.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ClassificationResult {
    pub model_id: String,
    pub model_name: String,
    pub label: String,
    pub confidence_percent: f32,
    pub metrics: InferenceMetrics,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LivePrediction {
    pub model_id: String,
    pub label: String,
    pub confidence_percent: f32,
    pub metrics: InferenceMetrics,
}
