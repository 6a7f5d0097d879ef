use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use renderslave_rs::messages::WireMessage;
use renderslave_rs::networking::{Channel, ChannelError, ProtocolError};
use renderslave_rs::types::{
    brick::Brick, image::ImagePayload, transforms::Matrix4, volume::VolumeDataset,
};

/// A channel stub that replays a scripted sequence of receive outcomes and
/// records every transmitted image.
///
/// Once the script is exhausted, receives behave like a dead link: they
/// pause briefly (so spinning loops stay polite) and fail with a transport
/// error.
pub(crate) struct ScriptedChannel {
    script: Mutex<VecDeque<Result<WireMessage, ChannelError>>>,
    send_failures: Mutex<VecDeque<ChannelError>>,
    sent_images: Arc<Mutex<Vec<ImagePayload>>>,
    send_attempts: Arc<AtomicU32>,
}

impl ScriptedChannel {
    pub(crate) fn new(
        script: Vec<Result<WireMessage, ChannelError>>,
    ) -> ScriptedChannel {
        ScriptedChannel {
            script: Mutex::new(script.into()),
            send_failures: Mutex::new(VecDeque::new()),
            sent_images: Arc::new(Mutex::new(Vec::new())),
            send_attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Fail the next `failures.len()` image sends with the given errors.
    pub(crate) fn fail_sends(self, failures: Vec<ChannelError>) -> ScriptedChannel {
        *self.send_failures.lock().unwrap() = failures.into();
        self
    }

    /// Images whose send succeeded, in transmission order.
    pub(crate) fn sent_images(&self) -> Arc<Mutex<Vec<ImagePayload>>> {
        self.sent_images.clone()
    }

    /// Number of `send_image` calls, successful or not.
    pub(crate) fn send_attempts(&self) -> Arc<AtomicU32> {
        self.send_attempts.clone()
    }

    /// Script entries not yet consumed.
    pub(crate) fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }

    pub(crate) fn transport_error() -> ChannelError {
        ChannelError::Connection(io::Error::new(io::ErrorKind::TimedOut, "simulated drop"))
    }

    pub(crate) fn allocation_error() -> ChannelError {
        ChannelError::Allocation(renderslave_rs::networking::AllocationError {
            requested: 1 << 40,
            limit: 1 << 30,
        })
    }

    fn next(&self, expected: &'static str) -> Result<WireMessage, ChannelError> {
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(msg)) => {
                if msg.kind() == expected {
                    Ok(msg)
                } else {
                    Err(ChannelError::Protocol(ProtocolError::UnexpectedMessage {
                        expected,
                        got: msg.kind(),
                    }))
                }
            }
            Some(Err(err)) => Err(err),
            None => {
                thread::sleep(Duration::from_millis(1));
                Err(ChannelError::Connection(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "script exhausted",
                )))
            }
        }
    }
}

impl Channel for ScriptedChannel {
    fn recv_bool(&mut self) -> Result<bool, ChannelError> {
        match self.next("LoadFromFile")? {
            WireMessage::LoadFromFile(flag) => Ok(flag),
            _ => unreachable!(),
        }
    }

    fn send_bool(&mut self, _flag: bool) -> Result<(), ChannelError> {
        unreachable!("the slave never sends a handshake flag")
    }

    fn recv_file_path(&mut self) -> Result<String, ChannelError> {
        match self.next("FilePath")? {
            WireMessage::FilePath(path) => Ok(path),
            _ => unreachable!(),
        }
    }

    fn send_file_path(&mut self, _path: &str) -> Result<(), ChannelError> {
        unreachable!("the slave never sends a file path")
    }

    fn recv_volume(&mut self) -> Result<VolumeDataset, ChannelError> {
        match self.next("Volume")? {
            WireMessage::Volume(volume) => Ok(volume),
            _ => unreachable!(),
        }
    }

    fn send_volume(&mut self, _volume: &VolumeDataset) -> Result<(), ChannelError> {
        unreachable!("the slave never sends a volume")
    }

    fn recv_bricks(&mut self) -> Result<Vec<Brick>, ChannelError> {
        match self.next("Bricks")? {
            WireMessage::Bricks(bricks) => Ok(bricks),
            _ => unreachable!(),
        }
    }

    fn send_bricks(&mut self, _bricks: &[Brick]) -> Result<(), ChannelError> {
        unreachable!("the slave never sends bricks")
    }

    fn recv_matrix(&mut self) -> Result<Matrix4, ChannelError> {
        match self.next("Matrix")? {
            WireMessage::Matrix(matrix) => Ok(matrix),
            _ => unreachable!(),
        }
    }

    fn send_matrix(&mut self, _matrix: &Matrix4) -> Result<(), ChannelError> {
        unreachable!("the slave never sends a matrix")
    }

    fn recv_image(&mut self) -> Result<ImagePayload, ChannelError> {
        unreachable!("the slave never receives an image")
    }

    fn send_image(&mut self, image: &ImagePayload) -> Result<(), ChannelError> {
        self.send_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.send_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.sent_images.lock().unwrap().push(image.clone());
        Ok(())
    }
}
