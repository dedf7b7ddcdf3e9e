pub mod camera;
pub mod classifier;
pub mod labels;
pub mod live_inference;
pub mod model_registry;
pub mod screen;
