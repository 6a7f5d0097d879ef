//! Spatial partition descriptors for distributed rendering.

use borsh::{BorshDeserialize, BorshSerialize};

/// One spatial partition ("brick") of the volume.
///
/// The master decomposes the volume into bricks and sends the full, ordered
/// list to each slave during bootstrap. The list is read-only afterward and
/// is consumed by the renderer; this crate never inspects brick geometry.
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct Brick {
    /// Position of this brick in the master's decomposition order.
    pub index: u32,

    /// World-space minimum corner of the brick's bounding box.
    pub min: [f32; 3],

    /// World-space maximum corner of the brick's bounding box.
    pub max: [f32; 3],

    /// Inclusive voxel-space minimum corner.
    pub voxel_min: [u32; 3],

    /// Exclusive voxel-space maximum corner.
    pub voxel_max: [u32; 3],
}

impl Brick {
    /// World-space center of the brick.
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }
}
