//! The volume dataset: voxel data plus the metadata needed to interpret it.

use borsh::{BorshDeserialize, BorshSerialize};

/// A voxel dataset together with its descriptive metadata.
///
/// A dataset comes into existence through exactly one of two paths: an empty
/// shell that is filled in by a network transfer ([`VolumeDataset::empty`]),
/// or a shell carrying a file path that is filled in by a
/// [`VolumeLoader`](crate::renderer::VolumeLoader)
/// ([`VolumeDataset::with_source_path`]). Once acquired it is owned by the
/// session for the session's lifetime and shared with the renderer by
/// reference.
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct VolumeDataset {
    /// Path of the file this dataset was loaded from. `None` for datasets
    /// received over the network.
    pub source_path: Option<String>,

    /// Voxel counts along the x, y and z axes.
    pub vox: [u32; 3],

    /// Number of animation frames stored in `voxels`.
    pub frames: u32,

    /// Bytes per channel per voxel.
    pub bytes_per_channel: u8,

    /// Channels per voxel.
    pub channels: u8,

    /// World-space distance between neighboring voxels along each axis.
    pub spacing: [f32; 3],

    /// Flat voxel data, `frames` frames of `frame_bytes()` bytes each.
    pub voxels: Vec<u8>,
}

impl VolumeDataset {
    /// An empty dataset, to be filled in by a network transfer.
    pub fn empty() -> VolumeDataset {
        VolumeDataset {
            source_path: None,
            vox: [0, 0, 0],
            frames: 0,
            bytes_per_channel: 1,
            channels: 1,
            spacing: [1.0, 1.0, 1.0],
            voxels: Vec::new(),
        }
    }

    /// An empty dataset carrying the path it is to be loaded from.
    pub fn with_source_path(path: impl Into<String>) -> VolumeDataset {
        VolumeDataset {
            source_path: Some(path.into()),
            ..VolumeDataset::empty()
        }
    }

    /// Size in bytes of a single animation frame.
    pub fn frame_bytes(&self) -> usize {
        self.vox[0] as usize
            * self.vox[1] as usize
            * self.vox[2] as usize
            * self.bytes_per_channel as usize
            * self.channels as usize
    }

    /// Size in bytes of the voxel data across all frames.
    pub fn total_bytes(&self) -> usize {
        self.frame_bytes() * self.frames as usize
    }

    /// One-line human-readable summary, logged after a dataset is acquired.
    pub fn info_line(&self) -> String {
        format!(
            "{}: {}x{}x{} voxels, {} channel(s) x {} byte(s), {} frame(s), {} bytes total",
            self.source_path.as_deref().unwrap_or("<network>"),
            self.vox[0],
            self.vox[1],
            self.vox[2],
            self.channels,
            self.bytes_per_channel,
            self.frames,
            self.voxels.len(),
        )
    }
}
