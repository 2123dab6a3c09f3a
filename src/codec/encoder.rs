//! JPEG frame encoder
//!
//! Compresses RGB8 frames at a fixed quality for transmission.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::capture::RawFrame;
use crate::error::CodecError;

/// JPEG encoder with fixed quality
pub struct FrameEncoder {
    quality: u8,
    /// Output buffer capacity hint, grown to the largest frame seen
    capacity_hint: usize,
    /// Frame counter for statistics
    frames_encoded: u64,
    /// Total bytes produced
    bytes_produced: u64,
}

impl FrameEncoder {
    /// Create an encoder; quality is clamped to 1-100
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            capacity_hint: 0,
            frames_encoded: 0,
            bytes_produced: 0,
        }
    }

    /// Encode a frame to JPEG
    pub fn encode(&mut self, frame: &RawFrame) -> Result<Bytes, CodecError> {
        if !frame.is_valid() {
            return Err(CodecError::InvalidFrame(format!(
                "frame {} has {} bytes for {}x{} RGB",
                frame.sequence,
                frame.pixels.len(),
                frame.width,
                frame.height
            )));
        }

        let mut buffer = Vec::with_capacity(self.capacity_hint);
        JpegEncoder::new_with_quality(&mut buffer, self.quality)
            .encode(
                &frame.pixels,
                frame.width,
                frame.height,
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;

        self.capacity_hint = self.capacity_hint.max(buffer.len());
        self.frames_encoded += 1;
        self.bytes_produced += buffer.len() as u64;

        Ok(Bytes::from(buffer))
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Get statistics
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            frames_encoded: self.frames_encoded,
            bytes_produced: self.bytes_produced,
            average_frame_size: if self.frames_encoded > 0 {
                self.bytes_produced as f32 / self.frames_encoded as f32
            } else {
                0.0
            },
        }
    }
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    pub frames_encoded: u64,
    pub bytes_produced: u64,
    pub average_frame_size: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RawFrame {
        let mut pixels = Vec::with_capacity(RawFrame::expected_len(width, height));
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[(x * 4) as u8, (y * 4) as u8, 128]);
            }
        }
        RawFrame::new(pixels, width, height, 0)
    }

    #[test]
    fn test_encoding_produces_jpeg() {
        let mut encoder = FrameEncoder::new(80);
        let jpeg = encoder.encode(&gradient(64, 48)).unwrap();

        // SOI and EOI markers
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
        assert!(jpeg.len() < RawFrame::expected_len(64, 48));
        assert_eq!(encoder.stats().frames_encoded, 1);
    }

    #[test]
    fn test_quality_affects_size() {
        let frame = gradient(64, 64);
        let low = FrameEncoder::new(5).encode(&frame).unwrap();
        let high = FrameEncoder::new(100).encode(&frame).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(FrameEncoder::new(0).quality(), 1);
        assert_eq!(FrameEncoder::new(255).quality(), 100);
    }

    #[test]
    fn test_invalid_frame_rejected() {
        let mut encoder = FrameEncoder::new(80);
        let frame = RawFrame::new(vec![0; 10], 64, 48, 3);
        assert!(matches!(
            encoder.encode(&frame),
            Err(CodecError::InvalidFrame(_))
        ));
    }
}
