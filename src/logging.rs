/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via
//! the session's [config](crate::config::SessionConfiguration).
//!
//! The crate logs using the [log](https://docs.rs/log/latest/log/) crate. To
//! get these messages printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values.
//! The first two values are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this
//!    module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix
//!    Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example,
//! the following snippet is how a
//! [TransmitImage](crate::events::TransmitImageEvent) is printed:
//!
//! ```text
//! TransmitImage, 1701329264, 640, 480, 1228800
//! ```
//!
//! In the snippet, the third and fourth values are the transmitted frame's
//! width and height, and the fifth is its pixel payload size in bytes.

use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const LOAD_VOLUME: &str = "LoadVolume";
pub const RECEIVE_VOLUME: &str = "ReceiveVolume";
pub const RECEIVE_BRICKS: &str = "ReceiveBricks";
pub const CREATE_TARGET: &str = "CreateTarget";

pub const RECEIVE_TRANSFORMS: &str = "ReceiveTransforms";
pub const SKIP_FRAME: &str = "SkipFrame";
pub const RENDER_FRAME: &str = "RenderFrame";
pub const TRANSMIT_IMAGE: &str = "TransmitImage";
pub const TRANSMIT_FAILURE: &str = "TransmitFailure";

pub const END_SESSION: &str = "EndSession";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for LoadVolumeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |load_volume_event: &LoadVolumeEvent| {
            log::info!(
                "{}, {}, {}, {}",
                LOAD_VOLUME,
                secs_since_unix_epoch(load_volume_event.timestamp),
                load_volume_event.path,
                load_volume_event.voxel_bytes
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveVolumeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_volume_event: &ReceiveVolumeEvent| {
            log::info!(
                "{}, {}, {}x{}x{}, {}",
                RECEIVE_VOLUME,
                secs_since_unix_epoch(receive_volume_event.timestamp),
                receive_volume_event.vox[0],
                receive_volume_event.vox[1],
                receive_volume_event.vox[2],
                receive_volume_event.voxel_bytes
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveBricksEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_bricks_event: &ReceiveBricksEvent| {
            log::info!(
                "{}, {}, {}",
                RECEIVE_BRICKS,
                secs_since_unix_epoch(receive_bricks_event.timestamp),
                receive_bricks_event.brick_count
            )
        };
        Box::new(logger)
    }
}

impl Logger for CreateTargetEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |create_target_event: &CreateTargetEvent| {
            log::info!(
                "{}, {}, {}, {}",
                CREATE_TARGET,
                secs_since_unix_epoch(create_target_event.timestamp),
                create_target_event.viewport.width,
                create_target_event.viewport.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveTransformsEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_transforms_event: &ReceiveTransformsEvent| {
            log::debug!(
                "{}, {}",
                RECEIVE_TRANSFORMS,
                secs_since_unix_epoch(receive_transforms_event.timestamp)
            )
        };
        Box::new(logger)
    }
}

impl Logger for SkipFrameEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |skip_frame_event: &SkipFrameEvent| {
            log::info!(
                "{}, {}, {}",
                SKIP_FRAME,
                secs_since_unix_epoch(skip_frame_event.timestamp),
                skip_frame_event.consecutive_failures
            )
        };
        Box::new(logger)
    }
}

impl Logger for RenderFrameEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |render_frame_event: &RenderFrameEvent| {
            log::debug!(
                "{}, {}, {}, {}",
                RENDER_FRAME,
                secs_since_unix_epoch(render_frame_event.timestamp),
                render_frame_event.viewport.width,
                render_frame_event.viewport.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for TransmitImageEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |transmit_image_event: &TransmitImageEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                TRANSMIT_IMAGE,
                secs_since_unix_epoch(transmit_image_event.timestamp),
                transmit_image_event.width,
                transmit_image_event.height,
                transmit_image_event.image_bytes
            )
        };
        Box::new(logger)
    }
}

impl Logger for TransmitFailureEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |transmit_failure_event: &TransmitFailureEvent| {
            log::info!(
                "{}, {}, {}",
                TRANSMIT_FAILURE,
                secs_since_unix_epoch(transmit_failure_event.timestamp),
                transmit_failure_event.consecutive_failures
            )
        };
        Box::new(logger)
    }
}

impl Logger for EndSessionEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |end_session_event: &EndSessionEvent| {
            log::info!(
                "{}, {}, {:?}",
                END_SESSION,
                secs_since_unix_epoch(end_session_event.timestamp),
                end_session_event.reason
            )
        };
        Box::new(logger)
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}
