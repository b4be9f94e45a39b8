//! Capture persistence.

pub mod capture_file;

pub use capture_file::{default_capture_file_name, save_capture, CaptureFile};
