pub mod camera;
pub mod models;
