//! The rendered frame as it travels back to the master.

use borsh::{BorshDeserialize, BorshSerialize};

/// One rendered frame: a dense RGBA8 pixel buffer plus its dimensions.
///
/// Dimensions are carried height-first; rows are stored top to bottom with
/// no padding, so the pixel buffer is exactly `width * height * 4` bytes.
/// Payloads are transient: the render loop drops them as soon as the
/// transmit call returns, whatever its outcome.
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct ImagePayload {
    height: u32,
    width: u32,
    pixels: Vec<u8>,
}

impl ImagePayload {
    /// Wrap a pixel buffer. `pixels.len()` must equal `width * height * 4`.
    pub fn new(height: u32, width: u32, pixels: Vec<u8>) -> ImagePayload {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 4);
        ImagePayload {
            height,
            width,
            pixels,
        }
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}
