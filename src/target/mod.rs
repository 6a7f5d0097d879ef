//! The offscreen render target: the GPU surface frames are drawn into and
//! read back from.
//!
//! The steady-state loop only ever talks to the [`OffscreenTarget`] trait,
//! so the protocol sequencing is testable without a GPU; production slaves
//! use [`WgpuOffscreenTarget`](wgpu_offscreen::WgpuOffscreenTarget).

pub mod wgpu_offscreen;

use std::fmt;

/// A viewport rectangle in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// An origin-anchored viewport of the given size.
    pub fn with_size(width: u32, height: u32) -> Viewport {
        Viewport {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Scale both dimensions by `factor`, rounding to the nearest pixel.
    /// Dimensions never drop below one pixel.
    pub fn scaled(&self, factor: f32) -> Viewport {
        Viewport {
            x: self.x,
            y: self.y,
            width: ((self.width as f32 * factor).round() as u32).max(1),
            height: ((self.height as f32 * factor).round() as u32).max(1),
        }
    }

    /// Byte length of a tightly packed 4-channel, 8-bit capture of this
    /// viewport.
    pub fn rgba8_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Color layout of the offscreen target's texture.
///
/// The image payload layout is always RGBA8 regardless of this choice; a
/// BGRA target is swizzled during readback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
}

/// A GPU-side render surface that is never presented, only captured.
///
/// Allocated once per session, after bootstrap succeeds and before the first
/// render iteration, and reused for every frame. Per frame the owner must
/// execute the matched sequence `bind`, `clear`, draw, `synchronize`,
/// `read_pixels`, `unbind`; binding while bound is an error, as is touching
/// the surface while unbound.
pub trait OffscreenTarget: Send + 'static {
    /// One-time setup. Must be called once, before the first `bind`.
    fn prepare_for_rendering(&mut self) -> Result<(), RenderTargetError>;

    /// Make this surface the destination of subsequent draws.
    fn bind(&mut self) -> Result<(), RenderTargetError>;

    /// Clear the bound surface's color contents.
    fn clear(&mut self) -> Result<(), RenderTargetError>;

    /// Block until every queued draw against this surface has completed.
    /// Readback must not race in-flight work.
    fn synchronize(&mut self) -> Result<(), RenderTargetError>;

    /// The surface's current viewport rectangle.
    fn viewport(&self) -> Viewport;

    /// Copy the surface's color contents into a tightly packed RGBA8 buffer
    /// of exactly `viewport().rgba8_bytes()` bytes.
    fn read_pixels(&mut self) -> Result<Vec<u8>, RenderTargetError>;

    /// Restore the default render destination.
    fn unbind(&mut self) -> Result<(), RenderTargetError>;
}

/// Why an offscreen target operation failed.
#[derive(Debug)]
pub enum RenderTargetError {
    /// No usable GPU adapter was found.
    NoSuitableAdapter,

    /// The GPU device request failed.
    DeviceRequest(wgpu::RequestDeviceError),

    /// The target was used before `prepare_for_rendering`.
    NotPrepared,

    /// `bind` was called while the target was already bound.
    AlreadyBound,

    /// A per-frame operation was called while the target was unbound.
    NotBound,

    /// Mapping the readback buffer failed.
    Readback(wgpu::BufferAsyncError),
}

impl fmt::Display for RenderTargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderTargetError::NoSuitableAdapter => {
                write!(f, "no usable GPU adapter found")
            }
            RenderTargetError::DeviceRequest(e) => write!(f, "GPU device request failed: {e}"),
            RenderTargetError::NotPrepared => {
                write!(f, "offscreen target used before prepare_for_rendering")
            }
            RenderTargetError::AlreadyBound => {
                write!(f, "offscreen target bound re-entrantly")
            }
            RenderTargetError::NotBound => {
                write!(f, "offscreen target operation requires a bound target")
            }
            RenderTargetError::Readback(e) => write!(f, "pixel readback failed: {e}"),
        }
    }
}

impl std::error::Error for RenderTargetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderTargetError::DeviceRequest(e) => Some(e),
            RenderTargetError::Readback(e) => Some(e),
            _ => None,
        }
    }
}
