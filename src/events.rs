//! Definitions of session events for event handling and logging.
//! Note: an event for a given action indicates that the action has been completed.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::target::Viewport;

pub enum Event {
    // Bootstrap events.
    LoadVolume(LoadVolumeEvent),
    ReceiveVolume(ReceiveVolumeEvent),
    ReceiveBricks(ReceiveBricksEvent),
    CreateTarget(CreateTargetEvent),
    // Steady-state events.
    ReceiveTransforms(ReceiveTransformsEvent),
    SkipFrame(SkipFrameEvent),
    RenderFrame(RenderFrameEvent),
    TransmitImage(TransmitImageEvent),
    TransmitFailure(TransmitFailureEvent),
    // Lifecycle events.
    EndSession(EndSessionEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            event_publisher.send(event).unwrap()
        }
    }
}

/// The dataset was loaded from a local file.
pub struct LoadVolumeEvent {
    pub timestamp: SystemTime,
    pub path: String,
    pub voxel_bytes: usize,
}

/// The dataset was received over the connection.
pub struct ReceiveVolumeEvent {
    pub timestamp: SystemTime,
    pub vox: [u32; 3],
    pub voxel_bytes: usize,
}

pub struct ReceiveBricksEvent {
    pub timestamp: SystemTime,
    pub brick_count: usize,
}

/// The offscreen target was allocated and prepared.
pub struct CreateTargetEvent {
    pub timestamp: SystemTime,
    pub viewport: Viewport,
}

/// A complete (projection, model-view) pair arrived.
pub struct ReceiveTransformsEvent {
    pub timestamp: SystemTime,
}

/// A transform receive failed; the iteration was abandoned without
/// rendering or transmitting.
pub struct SkipFrameEvent {
    pub timestamp: SystemTime,
    pub consecutive_failures: u32,
}

pub struct RenderFrameEvent {
    pub timestamp: SystemTime,
    pub viewport: Viewport,
}

pub struct TransmitImageEvent {
    pub timestamp: SystemTime,
    pub width: u32,
    pub height: u32,
    pub image_bytes: usize,
}

pub struct TransmitFailureEvent {
    pub timestamp: SystemTime,
    pub consecutive_failures: u32,
}

/// The steady-state loop exited.
pub struct EndSessionEvent {
    pub timestamp: SystemTime,
    pub reason: ShutdownReason,
}

/// Why a steady-state loop exited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The session handle asked the loop to stop.
    ShutdownSignal,

    /// Consecutive transform-receive failures reached the configured limit.
    ReceiveFailureLimit,

    /// Consecutive image-transmit failures reached the configured limit.
    TransmitFailureLimit,

    /// The offscreen target failed mid-frame.
    RenderTargetFailure,
}
