//! The connection channel between one slave and its master.

pub mod channel;

pub mod tcp;

pub use channel::{AllocationError, Channel, ChannelError, ProtocolError, TransportKind};
pub use tcp::{TcpChannel, TcpChannelListener};
