//! Traits implemented by the external collaborators of a slave session: the
//! volume rendering algorithm and the dataset file loader.
//!
//! This crate never looks inside either. The renderer is an opaque
//! capability that can be told to operate in remote mode, given the current
//! frame's view transforms, and asked to draw; how it samples the volume,
//! walks the brick list, or builds its GPU pipelines is its own business.

use std::fmt;
use std::io;

use crate::target::OffscreenTarget;
use crate::types::transforms::ViewTransformPair;
use crate::types::volume::VolumeDataset;

/// The volume rendering algorithm driven by the steady-state loop.
///
/// A renderer is constructed by the session's renderer factory, which hands
/// it the acquired dataset and brick list, so it already holds both by the
/// time the first frame is rendered.
///
/// The type parameter pins a renderer to the target kind it can draw into,
/// so a wgpu-based renderer can reach the concrete color attachment while
/// the loop's sequencing stays target-agnostic.
pub trait VolumeRenderer<T: OffscreenTarget>: Send + 'static {
    /// Switch the renderer between local (interactive) and remote (driven)
    /// operation. The session flips this to `true` before the first frame.
    fn set_remote_mode(&mut self, remote: bool);

    /// Install the given matrices as the active projection and model-view
    /// state for the next `render_current_frame` call.
    fn load_view_transforms(&mut self, transforms: &ViewTransformPair);

    /// Draw one frame into the bound target. Queued GPU work does not need
    /// to be complete when this returns; the loop synchronizes before
    /// reading pixels back.
    fn render_current_frame(&mut self, target: &mut T);
}

/// Loads voxel data from a local file into a dataset shell.
pub trait VolumeLoader: Send + 'static {
    /// Fill in `dataset`, whose `source_path` names the file to read.
    fn load_volume(&mut self, dataset: &mut VolumeDataset) -> Result<(), LoadError>;
}

/// Why a local dataset load failed.
#[derive(Debug)]
pub enum LoadError {
    /// The file could not be read.
    Io(io::Error),

    /// The file was read but its extension or magic is not a known volume
    /// format.
    UnsupportedFormat(String),

    /// The file claims a known format but its contents do not parse.
    MalformedHeader(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "volume file unreadable: {e}"),
            LoadError::UnsupportedFormat(what) => {
                write!(f, "unsupported volume format: {what}")
            }
            LoadError::MalformedHeader(what) => write!(f, "malformed volume header: {what}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            _ => None,
        }
    }
}
