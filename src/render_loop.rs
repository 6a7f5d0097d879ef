/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The steady-state render/transfer state machine.
//!
//! This module defines the render loop thread, the driving force of a slave
//! session once bootstrap has completed. The thread cycles through four
//! states, unconditionally and indefinitely:
//!
//! ```text
//! AwaitingTransforms -> Rendering -> ReadingBack -> Transmitting
//!         ^                                             |
//!         +---------------------------------------------+
//! ```
//!
//! - **AwaitingTransforms**: block on receiving the projection matrix, then,
//!   only if that succeeded, block on receiving the model-view matrix. If
//!   either receive fails the iteration is abandoned: the loop re-enters
//!   `AwaitingTransforms` without rendering or transmitting, so a dropped or
//!   desynchronized frame is skipped rather than retried with a stale
//!   transform. The configured
//!   [receive failure policy](crate::config::FrameFailurePolicy) decides
//!   whether repeated failures eventually end the session.
//! - **Rendering**: bind the offscreen target, clear it, install the received
//!   pair as the active projection/model-view state, ask the renderer to draw
//!   the current frame, and force completion of all queued GPU work. The
//!   completion wait is a hard synchronization point: readback must not race
//!   in-flight draws.
//! - **ReadingBack**: query the target's viewport, copy its color contents
//!   into a tightly packed RGBA8 buffer of exactly `width * height * 4`
//!   bytes, and wrap it height-first as an image payload.
//! - **Transmitting**: hand the image to the channel for a blocking send,
//!   drop the transient payload whatever the outcome, and unbind the target.
//!   The configured transmit failure policy decides whether a failed send
//!   ends the session (the default) or is skipped like a dropped receive.
//!
//! The loop is fully synchronous: frame N+1's transforms are not read until
//! frame N's image has been handed to the transport, so the master's send
//! rate is throttled by the slave's render plus transfer latency without any
//! explicit windowing.
//!
//! There is no protocol-level stop message. The loop instead watches a
//! shutdown signal from its [`Session`](crate::session::Session) handle at
//! every state transition, which is what makes teardown possible without
//! killing the process.

use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use crate::config::FrameFailurePolicy;
use crate::events::*;
use crate::networking::{Channel, ChannelError};
use crate::renderer::VolumeRenderer;
use crate::target::{OffscreenTarget, RenderTargetError};
use crate::types::image::ImagePayload;
use crate::types::transforms::ViewTransformPair;

pub(crate) struct RenderLoop<C: Channel, T: OffscreenTarget, R: VolumeRenderer<T>> {
    channel: C,
    target: T,
    renderer: R,
    receive_failure_policy: FrameFailurePolicy,
    transmit_failure_policy: FrameFailurePolicy,
    shutdown_signal: Receiver<()>,
    event_publisher: Option<Sender<Event>>,
}

impl<C: Channel, T: OffscreenTarget, R: VolumeRenderer<T>> RenderLoop<C, T, R> {
    pub(crate) fn new(
        channel: C,
        target: T,
        renderer: R,
        receive_failure_policy: FrameFailurePolicy,
        transmit_failure_policy: FrameFailurePolicy,
        shutdown_signal: Receiver<()>,
        event_publisher: Option<Sender<Event>>,
    ) -> RenderLoop<C, T, R> {
        RenderLoop {
            channel,
            target,
            renderer,
            receive_failure_policy,
            transmit_failure_policy,
            shutdown_signal,
            event_publisher,
        }
    }

    pub(crate) fn start(self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    fn run(mut self) {
        let mut consecutive_receive_failures: u32 = 0;
        let mut consecutive_transmit_failures: u32 = 0;

        loop {
            if self.should_shutdown() {
                return self.end(ShutdownReason::ShutdownSignal);
            }

            // AwaitingTransforms.
            let transforms = match self.await_transforms() {
                Ok(transforms) => {
                    consecutive_receive_failures = 0;
                    transforms
                }
                Err(err) => {
                    consecutive_receive_failures += 1;
                    log::debug!("transform receive failed ({err}); frame skipped");
                    Event::publish(
                        &self.event_publisher,
                        Event::SkipFrame(SkipFrameEvent {
                            timestamp: SystemTime::now(),
                            consecutive_failures: consecutive_receive_failures,
                        }),
                    );
                    if self
                        .receive_failure_policy
                        .limit_reached(consecutive_receive_failures)
                    {
                        return self.end(ShutdownReason::ReceiveFailureLimit);
                    }
                    continue;
                }
            };

            if self.should_shutdown() {
                return self.end(ShutdownReason::ShutdownSignal);
            }

            // Rendering and ReadingBack. The target stays bound until the
            // image has been handed to the transport.
            let image = match self.render_and_capture(&transforms) {
                Ok(image) => image,
                Err(err) => {
                    log::error!("offscreen target failed mid-frame: {err}");
                    return self.end(ShutdownReason::RenderTargetFailure);
                }
            };

            // Transmitting. The payload is dropped as soon as the send
            // returns, success or not, and the target is unbound before the
            // outcome is acted on.
            let (width, height, image_bytes) = (image.width(), image.height(), image.pixels().len());
            let send_result = self.channel.send_image(&image);
            drop(image);
            if let Err(err) = self.target.unbind() {
                log::error!("offscreen target failed mid-frame: {err}");
                return self.end(ShutdownReason::RenderTargetFailure);
            }

            match send_result {
                Ok(()) => {
                    consecutive_transmit_failures = 0;
                    Event::publish(
                        &self.event_publisher,
                        Event::TransmitImage(TransmitImageEvent {
                            timestamp: SystemTime::now(),
                            width,
                            height,
                            image_bytes,
                        }),
                    );
                }
                Err(err) => {
                    consecutive_transmit_failures += 1;
                    log::warn!("image transmit failed ({err})");
                    Event::publish(
                        &self.event_publisher,
                        Event::TransmitFailure(TransmitFailureEvent {
                            timestamp: SystemTime::now(),
                            consecutive_failures: consecutive_transmit_failures,
                        }),
                    );
                    if self
                        .transmit_failure_policy
                        .limit_reached(consecutive_transmit_failures)
                    {
                        return self.end(ShutdownReason::TransmitFailureLimit);
                    }
                }
            }
        }
    }

    /// Receive one complete transform pair. The model-view receive is not
    /// attempted when the projection receive fails, so at most one matrix is
    /// consumed from a desynchronized stream.
    fn await_transforms(&mut self) -> Result<ViewTransformPair, ChannelError> {
        let projection = self.channel.recv_matrix()?;
        let modelview = self.channel.recv_matrix()?;
        Event::publish(
            &self.event_publisher,
            Event::ReceiveTransforms(ReceiveTransformsEvent {
                timestamp: SystemTime::now(),
            }),
        );
        Ok(ViewTransformPair {
            projection,
            modelview,
        })
    }

    /// Bind, clear, draw, synchronize, read back. On success the target is
    /// left bound for the transmit phase; on failure it is unbound
    /// best-effort so the bind/unbind pairing survives the error path.
    fn render_and_capture(
        &mut self,
        transforms: &ViewTransformPair,
    ) -> Result<ImagePayload, RenderTargetError> {
        self.target.bind()?;
        match self.draw_and_read_back(transforms) {
            Ok(image) => Ok(image),
            Err(err) => {
                let _ = self.target.unbind();
                Err(err)
            }
        }
    }

    fn draw_and_read_back(
        &mut self,
        transforms: &ViewTransformPair,
    ) -> Result<ImagePayload, RenderTargetError> {
        self.target.clear()?;
        self.renderer.load_view_transforms(transforms);
        self.renderer.render_current_frame(&mut self.target);
        self.target.synchronize()?;

        let viewport = self.target.viewport();
        let pixels = self.target.read_pixels()?;
        Event::publish(
            &self.event_publisher,
            Event::RenderFrame(RenderFrameEvent {
                timestamp: SystemTime::now(),
                viewport,
            }),
        );
        Ok(ImagePayload::new(viewport.height, viewport.width, pixels))
    }

    fn should_shutdown(&self) -> bool {
        match self.shutdown_signal.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                panic!("render loop thread disconnected from main thread")
            }
        }
    }

    fn end(self, reason: ShutdownReason) {
        log::info!("render loop ended: {reason:?}");
        Event::publish(
            &self.event_publisher,
            Event::EndSession(EndSessionEvent {
                timestamp: SystemTime::now(),
                reason,
            }),
        );
    }
}
