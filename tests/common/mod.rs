pub(crate) mod channel;

pub(crate) mod loader;

pub(crate) mod logging;

pub(crate) mod renderer;

pub(crate) mod target;

use renderslave_rs::messages::WireMessage;
use renderslave_rs::types::{brick::Brick, transforms::Matrix4, volume::VolumeDataset};

/// A small dataset suitable for transfer scripts.
pub(crate) fn test_volume() -> VolumeDataset {
    VolumeDataset {
        source_path: None,
        vox: [4, 4, 4],
        frames: 1,
        bytes_per_channel: 1,
        channels: 1,
        spacing: [1.0, 1.0, 1.0],
        voxels: vec![0x42; 64],
    }
}

pub(crate) fn test_bricks() -> Vec<Brick> {
    (0..2)
        .map(|i| Brick {
            index: i,
            min: [i as f32, 0.0, 0.0],
            max: [(i + 1) as f32, 1.0, 1.0],
            voxel_min: [i * 2, 0, 0],
            voxel_max: [(i + 1) * 2, 4, 4],
        })
        .collect()
}

/// A matrix whose first element identifies it, for pairing assertions.
pub(crate) fn numbered_matrix(n: u32) -> Matrix4 {
    let mut cols = Matrix4::IDENTITY.0;
    cols[0] = n as f32;
    Matrix4(cols)
}

/// The three-message handshake for the network dataset path.
pub(crate) fn network_bootstrap_script() -> Vec<Result<WireMessage, renderslave_rs::networking::ChannelError>> {
    vec![
        Ok(WireMessage::LoadFromFile(false)),
        Ok(WireMessage::Volume(test_volume())),
        Ok(WireMessage::Bricks(test_bricks())),
    ]
}
