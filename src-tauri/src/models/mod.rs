pub mod classify_types;
pub mod screen_types;
