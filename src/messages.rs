//! Exhaustive enumeration of every message variant that travels between
//! master and slave.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    brick::Brick, image::ImagePayload, transforms::Matrix4, volume::VolumeDataset,
};

/// All message variants used by the remote rendering protocol.
///
/// A session exchanges messages in a fixed order: [`LoadFromFile`], then
/// either [`FilePath`] or [`Volume`], then [`Bricks`], followed by an
/// unbounded repetition of two [`Matrix`] messages (projection, then
/// model-view) answered by one [`Image`].
///
/// Each message is borsh-encoded and framed with a `u32` little-endian byte
/// length. There is no version negotiation; peers must be built against
/// compatible encodings.
///
/// [`LoadFromFile`]: WireMessage::LoadFromFile
/// [`FilePath`]: WireMessage::FilePath
/// [`Volume`]: WireMessage::Volume
/// [`Bricks`]: WireMessage::Bricks
/// [`Matrix`]: WireMessage::Matrix
/// [`Image`]: WireMessage::Image
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum WireMessage {
    /// Whether the slave should load the dataset from a local file instead
    /// of receiving it over this connection.
    LoadFromFile(bool),

    /// Path of the local file to load the dataset from.
    FilePath(String),

    /// A fully-formed dataset, transferred from the master.
    Volume(VolumeDataset),

    /// The master's spatial decomposition of the volume.
    Bricks(Vec<Brick>),

    /// One 4x4 view matrix.
    Matrix(Matrix4),

    /// One rendered frame, sent from slave to master.
    Image(ImagePayload),
}

impl WireMessage {
    /// The variant's name, used in protocol error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::LoadFromFile(_) => "LoadFromFile",
            WireMessage::FilePath(_) => "FilePath",
            WireMessage::Volume(_) => "Volume",
            WireMessage::Bricks(_) => "Bricks",
            WireMessage::Matrix(_) => "Matrix",
            WireMessage::Image(_) => "Image",
        }
    }
}
