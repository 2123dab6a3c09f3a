//! Frame codec
//!
//! Compresses captured frames to JPEG before they are fanned out.

pub mod encoder;

pub use encoder::{EncoderStats, FrameEncoder};
