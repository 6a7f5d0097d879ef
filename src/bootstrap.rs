/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The two-phase session handshake: dataset acquisition, then brick
//! acquisition.
//!
//! Both steps are synchronous, run exactly once per session, and must both
//! succeed before any render state is created. Either step failing aborts
//! session startup; there is no retry, and the typed error is surfaced to
//! the operator.
//!
//! ## Dataset acquisition
//!
//! The master first announces, with a single boolean, whether this slave
//! should load the dataset from a local file or receive it over the
//! connection. Exactly one of the two paths executes:
//!
//! - **File path**: receive the file name, build a dataset shell carrying
//!   it, and hand the shell to the [`VolumeLoader`] collaborator. A loader
//!   failure drops the shell on scope exit and fails bootstrap with
//!   [`BootstrapError::FileIo`].
//! - **Network path**: build an empty shell and block on the dataset
//!   transfer. An allocation-class receive failure is reported as the
//!   distinguishable [`BootstrapError::Allocation`]; every other failure is
//!   a [`BootstrapError::Connection`].
//!
//! ## Brick acquisition
//!
//! One blocking receive of the master's ordered brick list. The list is
//! read-only from here on and is consumed by the renderer factory.

use std::fmt;

use crate::networking::{AllocationError, Channel, ChannelError};
use crate::renderer::{LoadError, VolumeLoader};
use crate::types::{brick::Brick, volume::VolumeDataset};

/// Why session bootstrap failed.
#[derive(Debug)]
pub enum BootstrapError {
    /// A handshake transfer failed at the transport or protocol level.
    Connection(ChannelError),

    /// A handshake blob was too large to buffer.
    Allocation(AllocationError),

    /// The local file load failed.
    FileIo { path: String, source: LoadError },
}

impl BootstrapError {
    fn from_channel(err: ChannelError) -> BootstrapError {
        match err {
            ChannelError::Allocation(e) => BootstrapError::Allocation(e),
            other => BootstrapError::Connection(other),
        }
    }
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapError::Connection(e) => write!(f, "handshake transfer failed: {e}"),
            BootstrapError::Allocation(e) => write!(f, "handshake transfer failed: {e}"),
            BootstrapError::FileIo { path, source } => {
                write!(f, "cannot load volume file {path}: {source}")
            }
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BootstrapError::Connection(e) => Some(e),
            BootstrapError::Allocation(e) => Some(e),
            BootstrapError::FileIo { source, .. } => Some(source),
        }
    }
}

/// Acquire the session's volume dataset, from a local file or from the
/// network as directed by the master's handshake flag.
pub fn acquire_volume<C: Channel, L: VolumeLoader>(
    channel: &mut C,
    loader: &mut L,
) -> Result<VolumeDataset, BootstrapError> {
    let load_from_file = channel.recv_bool().map_err(BootstrapError::from_channel)?;

    if load_from_file {
        let path = channel
            .recv_file_path()
            .map_err(BootstrapError::from_channel)?;
        log::info!("loading volume from file: {path}");

        let mut dataset = VolumeDataset::with_source_path(&path);
        match loader.load_volume(&mut dataset) {
            Ok(()) => {
                log::info!("{}", dataset.info_line());
                Ok(dataset)
            }
            Err(source) => {
                log::error!("cannot load volume file {path}: {source}");
                Err(BootstrapError::FileIo { path, source })
            }
        }
    } else {
        log::info!("waiting for volume transfer");
        match channel.recv_volume() {
            Ok(dataset) => {
                log::info!("volume transferred: {}", dataset.info_line());
                Ok(dataset)
            }
            Err(err) => {
                log::error!("cannot receive volume: {err}");
                Err(BootstrapError::from_channel(err))
            }
        }
    }
}

/// Acquire the master's brick decomposition of the volume.
pub fn acquire_bricks<C: Channel>(channel: &mut C) -> Result<Vec<Brick>, BootstrapError> {
    match channel.recv_bricks() {
        Ok(bricks) => {
            log::info!("brick outlines received: {}", bricks.len());
            Ok(bricks)
        }
        Err(err) => {
            log::error!("cannot receive brick outlines: {err}");
            Err(BootstrapError::from_channel(err))
        }
    }
}
