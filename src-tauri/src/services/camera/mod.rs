pub mod capture;
pub mod frame;

pub use capture::{decode_image, save_capture, CapturedPhoto};
pub use frame::{Frame, FramePool, FramePoolStats};
