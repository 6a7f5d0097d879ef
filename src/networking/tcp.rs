//! TCP implementation of the [`Channel`] trait.
//!
//! The slave side binds one listening socket and accepts exactly one peer
//! ([`TcpChannel::open`]); the master side dials ([`TcpChannel::connect`]).
//! Both ends disable Nagle coalescing on accept/connect so that per-frame
//! messages are not delayed by send batching.
//!
//! Every message is framed as a `u32` little-endian byte length followed by
//! the borsh encoding of one [`WireMessage`] variant.

use std::io::{self, Read, Write};
use std::net::{self, SocketAddr, ToSocketAddrs};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::config::ChannelConfiguration;
use crate::messages::WireMessage;
use crate::types::{
    brick::Brick, image::ImagePayload, transforms::Matrix4, volume::VolumeDataset,
};

use super::channel::{AllocationError, Channel, ChannelError, ProtocolError, TransportKind};

/// A bound, not-yet-accepted slave endpoint.
///
/// Splitting bind from accept lets callers learn the bound address before
/// the peer dials, which matters for port-0 binds.
#[derive(Debug)]
pub struct TcpChannelListener {
    listener: net::TcpListener,
    config: ChannelConfiguration,
}

impl TcpChannelListener {
    /// Bind the listening socket on all interfaces.
    ///
    /// Datagram transport is rejected here: the protocol is message-framed
    /// over a reliable byte stream and has no datagram encoding.
    pub fn bind(
        port: u16,
        transport: TransportKind,
        config: ChannelConfiguration,
    ) -> Result<TcpChannelListener, ChannelError> {
        if transport != TransportKind::Tcp {
            return Err(ChannelError::Connection(io::Error::new(
                io::ErrorKind::Unsupported,
                "datagram transport carries no message framing; use TransportKind::Tcp",
            )));
        }

        let listener =
            net::TcpListener::bind(("0.0.0.0", port)).map_err(ChannelError::Connection)?;
        Ok(TcpChannelListener { listener, config })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        self.listener.local_addr().map_err(ChannelError::Connection)
    }

    /// Block until one peer connects, then consume the listener.
    ///
    /// Only a single peer is served per session; the listening socket is
    /// closed as soon as the connection is established.
    pub fn accept(self) -> Result<TcpChannel, ChannelError> {
        let (stream, peer_addr) = self.listener.accept().map_err(ChannelError::Connection)?;
        TcpChannel::from_stream(stream, peer_addr, self.config)
    }
}

/// An established connection to the remote peer.
///
/// Exclusively owned by its session; the OS socket is released on drop.
pub struct TcpChannel {
    stream: net::TcpStream,
    peer_addr: SocketAddr,
    config: ChannelConfiguration,
}

impl TcpChannel {
    /// Bind, listen and accept one peer in a single call. This is the
    /// production slave-side entry point.
    pub fn open(
        port: u16,
        transport: TransportKind,
        config: ChannelConfiguration,
    ) -> Result<TcpChannel, ChannelError> {
        TcpChannelListener::bind(port, transport, config)?.accept()
    }

    /// Dial a listening slave. This is the master-side counterpart of
    /// [`open`](TcpChannel::open).
    pub fn connect(
        addr: impl ToSocketAddrs,
        config: ChannelConfiguration,
    ) -> Result<TcpChannel, ChannelError> {
        let stream = net::TcpStream::connect(addr).map_err(ChannelError::Connection)?;
        let peer_addr = stream.peer_addr().map_err(ChannelError::Connection)?;
        TcpChannel::from_stream(stream, peer_addr, config)
    }

    fn from_stream(
        stream: net::TcpStream,
        peer_addr: SocketAddr,
        config: ChannelConfiguration,
    ) -> Result<TcpChannel, ChannelError> {
        stream.set_nodelay(true).map_err(ChannelError::Connection)?;
        stream
            .set_read_timeout(config.read_timeout)
            .map_err(ChannelError::Connection)?;
        stream
            .set_write_timeout(config.write_timeout)
            .map_err(ChannelError::Connection)?;

        let channel = TcpChannel {
            stream,
            peer_addr,
            config,
        };
        channel.io_log(log::Level::Info, format_args!("connected"));
        Ok(channel)
    }

    /// The remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    // Per-message diagnostics are gated on this channel's own verbosity,
    // not on ambient process state.
    fn io_log(&self, level: log::Level, args: std::fmt::Arguments<'_>) {
        if self.config.verbosity >= level {
            log::log!(level, "[channel {}] {}", self.peer_addr, args);
        }
    }

    fn send_message(&mut self, msg: &WireMessage) -> Result<(), ChannelError> {
        let bytes = msg
            .try_to_vec()
            .map_err(|_| ChannelError::Protocol(ProtocolError::MalformedPayload))?;

        self.stream
            .write_all(&(bytes.len() as u32).to_le_bytes())
            .map_err(ChannelError::Connection)?;
        self.stream
            .write_all(&bytes)
            .map_err(ChannelError::Connection)?;

        self.io_log(
            log::Level::Debug,
            format_args!("sent {} ({} bytes)", msg.kind(), bytes.len()),
        );
        Ok(())
    }

    fn recv_message(&mut self) -> Result<WireMessage, ChannelError> {
        let len = {
            let mut buf = [0u8; 4];
            self.stream
                .read_exact(&mut buf)
                .map_err(ChannelError::Connection)?;
            u32::from_le_bytes(buf) as u64
        };

        if len > self.config.max_payload_bytes {
            return Err(ChannelError::Allocation(AllocationError {
                requested: len,
                limit: self.config.max_payload_bytes,
            }));
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(len as usize)
            .map_err(|_| {
                ChannelError::Allocation(AllocationError {
                    requested: len,
                    limit: self.config.max_payload_bytes,
                })
            })?;
        buf.resize(len as usize, 0);
        self.stream
            .read_exact(&mut buf)
            .map_err(ChannelError::Connection)?;

        let msg = WireMessage::try_from_slice(&buf)
            .map_err(|_| ChannelError::Protocol(ProtocolError::MalformedPayload))?;

        self.io_log(
            log::Level::Debug,
            format_args!("received {} ({} bytes)", msg.kind(), len),
        );
        Ok(msg)
    }
}

impl Channel for TcpChannel {
    fn recv_bool(&mut self) -> Result<bool, ChannelError> {
        match self.recv_message()? {
            WireMessage::LoadFromFile(flag) => Ok(flag),
            other => Err(unexpected("LoadFromFile", &other)),
        }
    }

    fn send_bool(&mut self, flag: bool) -> Result<(), ChannelError> {
        self.send_message(&WireMessage::LoadFromFile(flag))
    }

    fn recv_file_path(&mut self) -> Result<String, ChannelError> {
        match self.recv_message()? {
            WireMessage::FilePath(path) => Ok(path),
            other => Err(unexpected("FilePath", &other)),
        }
    }

    fn send_file_path(&mut self, path: &str) -> Result<(), ChannelError> {
        self.send_message(&WireMessage::FilePath(path.to_string()))
    }

    fn recv_volume(&mut self) -> Result<VolumeDataset, ChannelError> {
        match self.recv_message()? {
            WireMessage::Volume(volume) => Ok(volume),
            other => Err(unexpected("Volume", &other)),
        }
    }

    fn send_volume(&mut self, volume: &VolumeDataset) -> Result<(), ChannelError> {
        self.send_message(&WireMessage::Volume(volume.clone()))
    }

    fn recv_bricks(&mut self) -> Result<Vec<Brick>, ChannelError> {
        match self.recv_message()? {
            WireMessage::Bricks(bricks) => Ok(bricks),
            other => Err(unexpected("Bricks", &other)),
        }
    }

    fn send_bricks(&mut self, bricks: &[Brick]) -> Result<(), ChannelError> {
        self.send_message(&WireMessage::Bricks(bricks.to_vec()))
    }

    fn recv_matrix(&mut self) -> Result<Matrix4, ChannelError> {
        match self.recv_message()? {
            WireMessage::Matrix(matrix) => Ok(matrix),
            other => Err(unexpected("Matrix", &other)),
        }
    }

    fn send_matrix(&mut self, matrix: &Matrix4) -> Result<(), ChannelError> {
        self.send_message(&WireMessage::Matrix(*matrix))
    }

    fn recv_image(&mut self) -> Result<ImagePayload, ChannelError> {
        match self.recv_message()? {
            WireMessage::Image(image) => Ok(image),
            other => Err(unexpected("Image", &other)),
        }
    }

    fn send_image(&mut self, image: &ImagePayload) -> Result<(), ChannelError> {
        self.send_message(&WireMessage::Image(image.clone()))
    }
}

fn unexpected(expected: &'static str, got: &WireMessage) -> ChannelError {
    ChannelError::Protocol(ProtocolError::UnexpectedMessage {
        expected,
        got: got.kind(),
    })
}
