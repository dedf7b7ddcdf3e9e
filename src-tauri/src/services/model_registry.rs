use crate::error::AppError;

const HF_BASE_URL: &str = "https://huggingface.co";

/// Number of models every captured photo is run through.
pub const CAPTURE_MODEL_COUNT: usize = 3;

// ImageNet normalization constants
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
const HALF: [f32; 3] = [0.5, 0.5, 0.5];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    /// Hugging Face repository holding `onnx/model.onnx` and `config.json`.
    pub repo: &'static str,
    pub crop_size: u32,
    pub crop_pct: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl ModelDescriptor {
    pub fn model_url(&self) -> String {
        format!("{}/{}/resolve/main/onnx/model.onnx", HF_BASE_URL, self.repo)
    }

    pub fn config_url(&self) -> String {
        format!("{}/{}/resolve/main/config.json", HF_BASE_URL, self.repo)
    }

    pub fn model_file(&self) -> String {
        format!("{}.onnx", self.id)
    }

    pub fn config_file(&self) -> String {
        format!("{}-config.json", self.id)
    }
}

pub static MODELS: [ModelDescriptor; 5] = [
    ModelDescriptor {
        id: "mobilenet-v2",
        name: "MobileNet V2",
        repo: "Xenova/mobilenet_v2_1.0_224",
        crop_size: 224,
        crop_pct: 0.875,
        mean: HALF,
        std: HALF,
    },
    ModelDescriptor {
        id: "resnet-18",
        name: "ResNet 18",
        repo: "Xenova/resnet-18",
        crop_size: 224,
        crop_pct: 0.875,
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    },
    ModelDescriptor {
        id: "convnext-tiny",
        name: "ConvNeXt Tiny",
        repo: "Xenova/convnext-tiny-224",
        crop_size: 224,
        crop_pct: 0.875,
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    },
    ModelDescriptor {
        id: "resnet-50",
        name: "ResNet 50",
        repo: "Xenova/resnet-50",
        crop_size: 224,
        crop_pct: 0.875,
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    },
    ModelDescriptor {
        id: "vit-base",
        name: "ViT Base/16",
        repo: "Xenova/vit-base-patch16-224",
        crop_size: 224,
        crop_pct: 1.0,
        mean: HALF,
        std: HALF,
    },
];

pub fn find(id: &str) -> Option<&'static ModelDescriptor> {
    MODELS.iter().find(|m| m.id == id)
}

pub fn resolve(id: &str) -> Result<&'static ModelDescriptor, AppError> {
    find(id).ok_or_else(|| AppError::new(format!("Unknown model '{}'", id)))
}

pub fn default_live() -> &'static ModelDescriptor {
    &MODELS[0]
}

pub fn default_capture_ids() -> Vec<String> {
    MODELS[..CAPTURE_MODEL_COUNT]
        .iter()
        .map(|m| m.id.to_string())
        .collect()
}

/// Resolves the configured capture models, in order.
pub fn capture_models(ids: &[String]) -> Result<Vec<ModelDescriptor>, AppError> {
    if ids.len() != CAPTURE_MODEL_COUNT {
        return Err(AppError::new(format!(
            "Expected {} capture models, got {}",
            CAPTURE_MODEL_COUNT,
            ids.len()
        )));
    }
    ids.iter().map(|id| resolve(id).copied()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_and_files_are_unique() {
        let ids: HashSet<_> = MODELS.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), MODELS.len());
        let files: HashSet<_> = MODELS.iter().map(|m| m.model_file()).collect();
        assert_eq!(files.len(), MODELS.len());
    }

    #[test]
    fn urls_point_at_the_repo() {
        let m = resolve("resnet-18").unwrap();
        assert_eq!(
            m.model_url(),
            "https://huggingface.co/Xenova/resnet-18/resolve/main/onnx/model.onnx"
        );
        assert!(m.config_url().ends_with("/Xenova/resnet-18/resolve/main/config.json"));
    }

    #[test]
    fn default_capture_models_are_first_three() {
        let models = capture_models(&default_capture_ids()).unwrap();
        let ids: Vec<_> = models.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["mobilenet-v2", "resnet-18", "convnext-tiny"]);
    }

    #[test]
    fn capture_models_keep_configured_order() {
        let ids = vec!["vit-base".to_string(), "mobilenet-v2".into(), "resnet-50".into()];
        let models = capture_models(&ids).unwrap();
        assert_eq!(models[0].id, "vit-base");
        assert_eq!(models[2].id, "resnet-50");
    }

    #[test]
    fn capture_models_reject_wrong_count_or_unknown_id() {
        assert!(capture_models(&["resnet-18".to_string()]).is_err());
        let ids = vec!["resnet-18".to_string(), "nope".into(), "vit-base".into()];
        let err = capture_models(&ids).unwrap_err();
        assert!(err.message.contains("nope"));
    }
}
