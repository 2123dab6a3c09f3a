//! Capture subsystem module

pub mod device;
pub mod frame;
pub mod source;
pub mod synthetic;

pub use device::{CameraDriver, FrameGrabber};
pub use frame::RawFrame;
pub use source::{CaptureSource, CaptureStats};
pub use synthetic::SyntheticDriver;
