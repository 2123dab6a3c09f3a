//! Camera driver seam
//!
//! A driver opens a device by index and hands back a grabber that performs
//! blocking reads. Everything above this seam is device independent.

use crate::error::CaptureError;

/// An opened device producing RGB8 frames
pub trait FrameGrabber: Send {
    /// Block until the device yields the next frame
    fn grab(&mut self) -> Result<Vec<u8>, CaptureError>;

    /// Negotiated resolution, which may differ from the requested one
    fn resolution(&self) -> (u32, u32);
}

/// Opens capture devices
pub trait CameraDriver: Send + Sync {
    fn name(&self) -> &'static str;

    fn open(
        &self,
        index: u32,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn FrameGrabber>, CaptureError>;
}
