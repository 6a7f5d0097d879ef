/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build, bootstrap, and run a slave session.
//!
//! A session is the slave-side half of one master/slave connection: it
//! acquires the dataset and brick list over the channel, allocates the
//! offscreen target, and then serves the render/transfer loop until it is
//! told to stop or its failure policy gives up.
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the
//!   session](SessionSpec) with:
//!   1. `SessionSpec::builder` to construct a `SessionSpecBuilder`,
//!   2. The setters of the `SessionSpecBuilder`, and
//!   3. The `SessionSpecBuilder::build` method to construct a [SessionSpec],
//! - The function to [start](SessionSpec::start) a [Session] given its
//!   specification,
//! - [The type](Session) which keeps the session alive.
//!
//! ## Starting a session
//!
//! ```ignore
//! let channel = TcpChannel::open(port, TransportKind::Tcp, channel_config)?;
//! let session =
//!     SessionSpec::builder()
//!     .channel(channel)
//!     .loader(loader)
//!     .target(|viewport| WgpuOffscreenTarget::create(1.0, PixelFormat::Rgba8, viewport))
//!     .renderer(|volume, bricks| TexVolumeRenderer::new(volume, bricks))
//!     .configuration(configuration)
//!     .on_transmit_image(|event| frame_counter.fetch_add(1, Ordering::Relaxed))
//!     .build()
//!     .start()?;
//! session.join();
//! ```
//!
//! ### Required setters
//!
//! - `.channel(...)`: the established connection to the master. The session
//!   owns it exclusively until teardown.
//! - `.loader(...)`: the file-loader collaborator, used only when the master
//!   directs the slave to load the dataset locally.
//! - `.target(...)`: a factory building the offscreen target for the scaled
//!   viewport. Called exactly once, and only after both bootstrap steps have
//!   succeeded — a failed bootstrap never allocates GPU resources.
//! - `.renderer(...)`: a factory building the volume renderer from the
//!   acquired dataset and brick list, so the renderer already holds both
//!   when the first frame is drawn. The session flips the renderer to
//!   remote mode before entering the loop.
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! One `.on_*(...)` setter per event in [crate::events], registering a
//! user-defined handler closure fired from the event-bus thread.
//!
//! ## Teardown
//!
//! Dropping the [Session] signals the render-loop thread, joins it, and only
//! then stops the event bus (the loop publishes to the bus, so the bus must
//! outlive it). The render loop notices the signal between states; while it
//! is blocked waiting for the master's next transform, a finite channel
//! read timeout bounds how long that takes.

use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::SystemTime;

use typed_builder::TypedBuilder;

use crate::bootstrap::{self, BootstrapError};
use crate::config::SessionConfiguration;
use crate::event_bus::*;
use crate::events::*;
use crate::networking::Channel;
use crate::render_loop::RenderLoop;
use crate::renderer::{VolumeLoader, VolumeRenderer};
use crate::target::{OffscreenTarget, RenderTargetError, Viewport};
use crate::types::{brick::Brick, volume::VolumeDataset};

/// Builds the offscreen target for the scaled viewport. Called exactly once
/// per session, after bootstrap succeeds.
pub type TargetFactory<T> = Box<dyn FnOnce(Viewport) -> Result<T, RenderTargetError> + Send>;

/// Builds the volume renderer from the acquired dataset and brick list.
pub type RendererFactory<R> = Box<dyn FnOnce(Arc<VolumeDataset>, Vec<Brick>) -> R + Send>;

/// Stores all necessary parameters and trait implementations required to run
/// a [Session].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [SessionSpec]. On the builder call the following methods to construct a valid [SessionSpec].

    Required:
    - `.channel(...)`
    - `.loader(...)`
    - `.target(...)`
    - `.renderer(...)`
    - `.configuration(...)`

    Optional: one `.on_*(...)` setter per event in [crate::events].
"))]
pub struct SessionSpec<C: Channel, L: VolumeLoader, T: OffscreenTarget, R: VolumeRenderer<T>> {
    // Required parameters
    #[builder(setter(
        doc = "Set the established connection to the master. The session takes exclusive ownership. Required."
    ))]
    channel: C,
    #[builder(setter(
        doc = "Set the file-loader collaborator used for the local-file dataset path. Required."
    ))]
    loader: L,
    #[builder(setter(
        transform = |factory: impl FnOnce(Viewport) -> Result<T, RenderTargetError> + Send + 'static|
            Box::new(factory) as TargetFactory<T>,
        doc = "Set the factory that builds the offscreen target for the scaled viewport. Invoked exactly once, after bootstrap succeeds. Required."
    ))]
    target: TargetFactory<T>,
    #[builder(setter(
        transform = |factory: impl FnOnce(Arc<VolumeDataset>, Vec<Brick>) -> R + Send + 'static|
            Box::new(factory) as RendererFactory<R>,
        doc = "Set the factory that builds the volume renderer from the acquired dataset and brick list. Required."
    ))]
    renderer: RendererFactory<R>,
    #[builder(setter(
        doc = "Set the [configuration](SessionConfiguration), which contains the necessary parameters to run a session. Required."
    ))]
    configuration: SessionConfiguration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&LoadVolumeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<LoadVolumeEvent>),
    doc = "Register a handler closure to be invoked after the dataset is loaded from a local file. Optional."))]
    on_load_volume: Option<HandlerPtr<LoadVolumeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveVolumeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveVolumeEvent>),
    doc = "Register a handler closure to be invoked after the dataset is received over the connection. Optional."))]
    on_receive_volume: Option<HandlerPtr<ReceiveVolumeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveBricksEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveBricksEvent>),
    doc = "Register a handler closure to be invoked after the brick list is received. Optional."))]
    on_receive_bricks: Option<HandlerPtr<ReceiveBricksEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CreateTargetEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CreateTargetEvent>),
    doc = "Register a handler closure to be invoked after the offscreen target is allocated and prepared. Optional."))]
    on_create_target: Option<HandlerPtr<CreateTargetEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveTransformsEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveTransformsEvent>),
    doc = "Register a handler closure to be invoked after a complete transform pair is received. Optional."))]
    on_receive_transforms: Option<HandlerPtr<ReceiveTransformsEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SkipFrameEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SkipFrameEvent>),
    doc = "Register a handler closure to be invoked after an iteration is abandoned because a transform receive failed. Optional."))]
    on_skip_frame: Option<HandlerPtr<SkipFrameEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RenderFrameEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RenderFrameEvent>),
    doc = "Register a handler closure to be invoked after a frame is rendered and read back. Optional."))]
    on_render_frame: Option<HandlerPtr<RenderFrameEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&TransmitImageEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<TransmitImageEvent>),
    doc = "Register a handler closure to be invoked after a frame is transmitted to the master. Optional."))]
    on_transmit_image: Option<HandlerPtr<TransmitImageEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&TransmitFailureEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<TransmitFailureEvent>),
    doc = "Register a handler closure to be invoked after a frame transmit fails. Optional."))]
    on_transmit_failure: Option<HandlerPtr<TransmitFailureEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&EndSessionEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<EndSessionEvent>),
    doc = "Register a handler closure to be invoked when the render loop exits. Optional."))]
    on_end_session: Option<HandlerPtr<EndSessionEvent>>,
}

impl<C: Channel, L: VolumeLoader, T: OffscreenTarget, R: VolumeRenderer<T>>
    SessionSpec<C, L, T, R>
{
    /// Bootstrap the session on the calling thread, then start the
    /// render-loop thread (and the event-bus thread, if any handler is
    /// registered), returning the handle that keeps the session alive.
    ///
    /// Bootstrap failures abort startup before any render state exists: on
    /// `Err`, no offscreen target has been created and no thread has been
    /// spawned.
    pub fn start(self) -> Result<Session, SessionStartError> {
        let SessionSpec {
            mut channel,
            mut loader,
            target,
            renderer,
            configuration,
            on_load_volume,
            on_receive_volume,
            on_receive_bricks,
            on_create_target,
            on_receive_transforms,
            on_skip_frame,
            on_render_frame,
            on_transmit_image,
            on_transmit_failure,
            on_end_session,
        } = self;

        let event_handlers = EventHandlers::new(
            configuration.log_events,
            on_load_volume,
            on_receive_volume,
            on_receive_bricks,
            on_create_target,
            on_receive_transforms,
            on_skip_frame,
            on_render_frame,
            on_transmit_image,
            on_transmit_failure,
            on_end_session,
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        // Bootstrap, synchronously. A failure in either step returns here,
        // before the offscreen target or the renderer is ever constructed.
        let volume = bootstrap::acquire_volume(&mut channel, &mut loader)?;
        match &volume.source_path {
            Some(path) => Event::publish(
                &event_publisher,
                Event::LoadVolume(LoadVolumeEvent {
                    timestamp: SystemTime::now(),
                    path: path.clone(),
                    voxel_bytes: volume.voxels.len(),
                }),
            ),
            None => Event::publish(
                &event_publisher,
                Event::ReceiveVolume(ReceiveVolumeEvent {
                    timestamp: SystemTime::now(),
                    vox: volume.vox,
                    voxel_bytes: volume.voxels.len(),
                }),
            ),
        }
        let volume = Arc::new(volume);

        let bricks = bootstrap::acquire_bricks(&mut channel)?;
        Event::publish(
            &event_publisher,
            Event::ReceiveBricks(ReceiveBricksEvent {
                timestamp: SystemTime::now(),
                brick_count: bricks.len(),
            }),
        );

        // The offscreen target: created exactly once, only now that both
        // bootstrap steps have succeeded.
        let mut target =
            (target)(configuration.scaled_viewport()).map_err(SessionStartError::RenderTarget)?;
        target
            .prepare_for_rendering()
            .map_err(SessionStartError::RenderTarget)?;
        Event::publish(
            &event_publisher,
            Event::CreateTarget(CreateTargetEvent {
                timestamp: SystemTime::now(),
                viewport: target.viewport(),
            }),
        );

        let mut renderer = (renderer)(volume.clone(), bricks);
        renderer.set_remote_mode(true);

        let (render_loop_shutdown, render_loop_shutdown_receiver) = mpsc::channel();
        let render_loop = RenderLoop::new(
            channel,
            target,
            renderer,
            configuration.receive_failure_policy,
            configuration.transmit_failure_policy,
            render_loop_shutdown_receiver,
            event_publisher,
        )
        .start();

        let (event_bus_shutdown, event_bus_shutdown_receiver) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let event_bus = if !event_handlers.is_empty() {
            Some(start_event_bus(
                event_handlers,
                event_subscriber.unwrap(), // Safety: should be Some(...).
                event_bus_shutdown_receiver.unwrap(), // Safety: should be Some(...).
            ))
        } else {
            None
        };

        Ok(Session {
            volume,
            render_loop: Some(render_loop),
            render_loop_shutdown,
            event_bus,
            event_bus_shutdown,
        })
    }
}

/// A handle to the background threads of a running slave session. When this
/// value is dropped, the render loop is signalled and joined, then the event
/// bus is shut down.
pub struct Session {
    volume: Arc<VolumeDataset>,
    render_loop: Option<JoinHandle<()>>,
    render_loop_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl Session {
    /// The dataset acquired during bootstrap.
    pub fn volume(&self) -> &VolumeDataset {
        &self.volume
    }

    /// Block until the render loop ends on its own — by failure policy, or
    /// by a fatal target failure — then tear down the event bus.
    pub fn join(mut self) {
        if let Some(render_loop) = self.render_loop.take() {
            render_loop.join().unwrap();
        }
        self.shutdown_event_bus();
    }

    fn shutdown_event_bus(&mut self) {
        if let Some(event_bus) = self.event_bus.take() {
            self.event_bus_shutdown
                .iter()
                .for_each(|shutdown| shutdown.send(()).unwrap());
            event_bus.join().unwrap();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Safety: the order of thread shutdown in this function is important.
        // The render loop publishes events consumed by the event bus, so the
        // loop must be joined before the bus is taken down.
        if let Some(render_loop) = self.render_loop.take() {
            // The loop may have already ended by failure policy, in which
            // case the signal has no receiver.
            let _ = self.render_loop_shutdown.send(());
            render_loop.join().unwrap();
        }

        self.shutdown_event_bus();
    }
}

/// Why session startup failed. On any of these, no partial session exists:
/// no thread was spawned and no GPU resource outlives the error.
#[derive(Debug)]
pub enum SessionStartError {
    /// One of the two bootstrap steps failed.
    Bootstrap(BootstrapError),

    /// The offscreen target could not be created or prepared.
    RenderTarget(RenderTargetError),
}

impl From<BootstrapError> for SessionStartError {
    fn from(err: BootstrapError) -> SessionStartError {
        SessionStartError::Bootstrap(err)
    }
}

impl std::fmt::Display for SessionStartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStartError::Bootstrap(e) => write!(f, "session bootstrap failed: {e}"),
            SessionStartError::RenderTarget(e) => {
                write!(f, "offscreen target creation failed: {e}")
            }
        }
    }
}

impl std::error::Error for SessionStartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionStartError::Bootstrap(e) => Some(e),
            SessionStartError::RenderTarget(e) => Some(e),
        }
    }
}
