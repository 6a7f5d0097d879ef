//! The [`Channel`] trait and its error taxonomy.

use std::fmt;
use std::io;

use crate::types::{
    brick::Brick, image::ImagePayload, transforms::Matrix4, volume::VolumeDataset,
};

/// The transport a channel runs over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    Tcp,
    Udp,
}

/// A bidirectional, message-oriented connection to the remote peer.
///
/// Every method blocks until its message has been fully transferred or the
/// transfer has failed. A non-`Ok` result is fatal to the current operation
/// but not necessarily to the session; the caller decides whether to abort
/// (bootstrap does) or skip (the steady-state loop does, for transform
/// receives).
///
/// A channel is exclusively owned by one session for the session's lifetime;
/// the underlying socket resource is released when the channel is dropped.
pub trait Channel: Send + 'static {
    fn recv_bool(&mut self) -> Result<bool, ChannelError>;
    fn send_bool(&mut self, flag: bool) -> Result<(), ChannelError>;

    fn recv_file_path(&mut self) -> Result<String, ChannelError>;
    fn send_file_path(&mut self, path: &str) -> Result<(), ChannelError>;

    fn recv_volume(&mut self) -> Result<VolumeDataset, ChannelError>;
    fn send_volume(&mut self, volume: &VolumeDataset) -> Result<(), ChannelError>;

    fn recv_bricks(&mut self) -> Result<Vec<Brick>, ChannelError>;
    fn send_bricks(&mut self, bricks: &[Brick]) -> Result<(), ChannelError>;

    fn recv_matrix(&mut self) -> Result<Matrix4, ChannelError>;
    fn send_matrix(&mut self, matrix: &Matrix4) -> Result<(), ChannelError>;

    fn recv_image(&mut self) -> Result<ImagePayload, ChannelError>;
    fn send_image(&mut self, image: &ImagePayload) -> Result<(), ChannelError>;
}

/// Why a channel operation failed.
#[derive(Debug)]
pub enum ChannelError {
    /// Transport-level failure on the underlying socket.
    Connection(io::Error),

    /// The peer announced a payload this side is unwilling or unable to
    /// buffer.
    Allocation(AllocationError),

    /// The bytes on the wire do not form the expected message.
    Protocol(ProtocolError),
}

impl ChannelError {
    /// Whether this failure belongs to the allocation domain.
    pub fn is_allocation(&self) -> bool {
        matches!(self, ChannelError::Allocation(_))
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Connection(e) => write!(f, "connection failure: {e}"),
            ChannelError::Allocation(e) => write!(f, "{e}"),
            ChannelError::Protocol(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChannelError::Connection(e) => Some(e),
            ChannelError::Allocation(_) => None,
            ChannelError::Protocol(_) => None,
        }
    }
}

/// A blob receive could not be buffered: the announced length exceeds the
/// configured limit, or reserving the buffer failed.
#[derive(Debug)]
pub struct AllocationError {
    /// Announced payload length in bytes.
    pub requested: u64,
    /// The configured `max_payload_bytes` at the time of the failure.
    pub limit: u64,
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot buffer {}-byte payload (limit: {} bytes)",
            self.requested, self.limit
        )
    }
}

impl std::error::Error for AllocationError {}

/// A wire-format violation.
#[derive(Debug)]
pub enum ProtocolError {
    /// A well-framed message arrived, but it was the wrong variant for the
    /// protocol phase the session is in.
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },

    /// The framed bytes could not be decoded into any message variant.
    MalformedPayload,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnexpectedMessage { expected, got } => {
                write!(f, "expected {expected} message, got {got}")
            }
            ProtocolError::MalformedPayload => write!(f, "malformed message payload"),
        }
    }
}

impl std::error::Error for ProtocolError {}
