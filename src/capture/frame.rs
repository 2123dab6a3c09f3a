//! Raw captured frames

use chrono::{DateTime, Utc};

/// One captured RGB8 frame. Owned by the pipeline for a single pass.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Packed RGB8 pixels, row major
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
    /// Monotonically increasing per capture source
    pub sequence: u64,
}

impl RawFrame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            captured_at: Utc::now(),
            sequence,
        }
    }

    /// Byte length an RGB8 buffer of this resolution must have
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == Self::expected_len(self.width, self.height)
    }

    /// RGB value at (x, y); None when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels.get(i..i + 3).map(|p| [p[0], p[1], p[2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_validity() {
        let frame = RawFrame::new(vec![0; 4 * 2 * 3], 4, 2, 0);
        assert!(frame.is_valid());
        assert_eq!(frame.pixel(3, 1), Some([0, 0, 0]));
        assert_eq!(frame.pixel(4, 0), None);

        let short = RawFrame::new(vec![0; 5], 4, 2, 1);
        assert!(!short.is_valid());
    }
}
