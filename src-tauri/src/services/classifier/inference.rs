use crate::error::AppError;
use crate::models::classify_types::{Classification, InferenceMetrics, Prediction};
use crate::services::labels::LabelTable;
use crate::services::model_registry::ModelDescriptor;
use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;
use std::time::Instant;

pub fn preprocess_image(img: &DynamicImage, model: &ModelDescriptor) -> Result<Array4<f32>, AppError> {
    let crop_size = model.crop_size;
    if img.width() == 0 || img.height() == 0 {
        return Err(AppError::new("Cannot classify an empty image"));
    }

    // Resize shortest edge to ceil(crop_size / crop_pct), then center crop
    let resize_size = (crop_size as f32 / model.crop_pct).ceil() as u32;
    let (w, h) = (img.width(), img.height());
    let (new_w, new_h) = if w < h {
        (resize_size, ((h as f32 / w as f32) * resize_size as f32).round() as u32)
    } else {
        (((w as f32 / h as f32) * resize_size as f32).round() as u32, resize_size)
    };
    let resized = img.resize_exact(new_w, new_h, image::imageops::FilterType::Triangle);

    let crop_x = (new_w.saturating_sub(crop_size)) / 2;
    let crop_y = (new_h.saturating_sub(crop_size)) / 2;
    let cropped = resized.crop_imm(crop_x, crop_y, crop_size, crop_size);
    let rgb = cropped.to_rgb8();

    // Normalize and transpose HWC -> CHW in one pass; the frames are small.
    let hw = (crop_size * crop_size) as usize;
    let mut data = vec![0f32; 3 * hw];
    for (i, pixel) in rgb.into_raw().chunks_exact(3).enumerate() {
        for c in 0..3 {
            data[c * hw + i] = (pixel[c] as f32 / 255.0 - model.mean[c]) / model.std[c];
        }
    }

    Array4::from_shape_vec((1, 3, crop_size as usize, crop_size as usize), data)
        .map_err(|e| AppError::new(format!("Failed to create tensor: {}", e)))
}

/// Runs the session and returns the raw logits of its first output.
pub fn run_session(session: &mut Session, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
    let input_name = session.inputs()[0].name().to_string();

    let input_tensor = Value::from_array(input)
        .map_err(|e| AppError::new(format!("Failed to create tensor value: {}", e)))?;

    let outputs = session
        .run(ort::inputs![input_name.as_str() => input_tensor])
        .map_err(|e| AppError::new(format!("Inference failed: {}", e)))?;

    let output_value = outputs
        .values()
        .next()
        .ok_or_else(|| AppError::new("Model produced no outputs"))?;

    let (_, data) = output_value
        .try_extract_tensor::<f32>()
        .map_err(|e| AppError::new(format!("Failed to extract output tensor: {}", e)))?;

    Ok(data.to_vec())
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();
    logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .collect()
}

pub fn top_k(probabilities: &[f32], labels: &LabelTable, k: usize) -> Vec<Prediction> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    indexed
        .into_iter()
        .take(k)
        .map(|(idx, confidence)| Prediction {
            class_name: labels.get(idx),
            confidence,
        })
        .collect()
}

/// Probability in [0, 1] as a percentage with one decimal place.
pub fn confidence_percent(probability: f32) -> f32 {
    if probability.is_nan() {
        return 0.0;
    }
    let percent = (probability * 1000.0).round() / 10.0;
    percent.clamp(0.0, 100.0)
}

pub fn classify_with_session(
    session: &mut Session,
    model: &ModelDescriptor,
    img: &DynamicImage,
    labels: &LabelTable,
    k: usize,
) -> Result<Classification, AppError> {
    let start = Instant::now();
    let tensor = preprocess_image(img, model)?;
    let pre_processed = Instant::now();

    let logits = run_session(session, tensor)?;
    let inferred = Instant::now();

    let predictions = top_k(&softmax(&logits), labels, k);
    let done = Instant::now();

    let ms = |from: Instant, to: Instant| to.duration_since(from).as_secs_f64() * 1000.0;
    Ok(Classification {
        predictions,
        metrics: InferenceMetrics {
            pre_processing_ms: ms(start, pre_processed),
            inference_ms: ms(pre_processed, inferred),
            post_processing_ms: ms(inferred, done),
            total_ms: ms(start, done),
        },
    })
}
