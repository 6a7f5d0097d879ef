use std::sync::mpsc::Receiver;
use std::sync::mpsc::TryRecvError;
use std::thread;
use std::thread::JoinHandle;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

pub(crate) struct EventHandlers {
    pub(crate) load_volume_handlers: Vec<HandlerPtr<LoadVolumeEvent>>,
    pub(crate) receive_volume_handlers: Vec<HandlerPtr<ReceiveVolumeEvent>>,
    pub(crate) receive_bricks_handlers: Vec<HandlerPtr<ReceiveBricksEvent>>,
    pub(crate) create_target_handlers: Vec<HandlerPtr<CreateTargetEvent>>,
    pub(crate) receive_transforms_handlers: Vec<HandlerPtr<ReceiveTransformsEvent>>,
    pub(crate) skip_frame_handlers: Vec<HandlerPtr<SkipFrameEvent>>,
    pub(crate) render_frame_handlers: Vec<HandlerPtr<RenderFrameEvent>>,
    pub(crate) transmit_image_handlers: Vec<HandlerPtr<TransmitImageEvent>>,
    pub(crate) transmit_failure_handlers: Vec<HandlerPtr<TransmitFailureEvent>>,
    pub(crate) end_session_handlers: Vec<HandlerPtr<EndSessionEvent>>,
}

impl EventHandlers {
    pub(crate) fn new(
        log_events: bool,
        on_load_volume: Option<HandlerPtr<LoadVolumeEvent>>,
        on_receive_volume: Option<HandlerPtr<ReceiveVolumeEvent>>,
        on_receive_bricks: Option<HandlerPtr<ReceiveBricksEvent>>,
        on_create_target: Option<HandlerPtr<CreateTargetEvent>>,
        on_receive_transforms: Option<HandlerPtr<ReceiveTransformsEvent>>,
        on_skip_frame: Option<HandlerPtr<SkipFrameEvent>>,
        on_render_frame: Option<HandlerPtr<RenderFrameEvent>>,
        on_transmit_image: Option<HandlerPtr<TransmitImageEvent>>,
        on_transmit_failure: Option<HandlerPtr<TransmitFailureEvent>>,
        on_end_session: Option<HandlerPtr<EndSessionEvent>>,
    ) -> EventHandlers {
        let mut handlers = EventHandlers {
            load_volume_handlers: Vec::new(),
            receive_volume_handlers: Vec::new(),
            receive_bricks_handlers: Vec::new(),
            create_target_handlers: Vec::new(),
            receive_transforms_handlers: Vec::new(),
            skip_frame_handlers: Vec::new(),
            render_frame_handlers: Vec::new(),
            transmit_image_handlers: Vec::new(),
            transmit_failure_handlers: Vec::new(),
            end_session_handlers: Vec::new(),
        };

        if log_events {
            handlers.load_volume_handlers.push(LoadVolumeEvent::get_logger());
            handlers.receive_volume_handlers.push(ReceiveVolumeEvent::get_logger());
            handlers.receive_bricks_handlers.push(ReceiveBricksEvent::get_logger());
            handlers.create_target_handlers.push(CreateTargetEvent::get_logger());
            handlers.receive_transforms_handlers.push(ReceiveTransformsEvent::get_logger());
            handlers.skip_frame_handlers.push(SkipFrameEvent::get_logger());
            handlers.render_frame_handlers.push(RenderFrameEvent::get_logger());
            handlers.transmit_image_handlers.push(TransmitImageEvent::get_logger());
            handlers.transmit_failure_handlers.push(TransmitFailureEvent::get_logger());
            handlers.end_session_handlers.push(EndSessionEvent::get_logger());
        }

        if let Some(handler) = on_load_volume {
            handlers.load_volume_handlers.push(handler)
        }
        if let Some(handler) = on_receive_volume {
            handlers.receive_volume_handlers.push(handler)
        }
        if let Some(handler) = on_receive_bricks {
            handlers.receive_bricks_handlers.push(handler)
        }
        if let Some(handler) = on_create_target {
            handlers.create_target_handlers.push(handler)
        }
        if let Some(handler) = on_receive_transforms {
            handlers.receive_transforms_handlers.push(handler)
        }
        if let Some(handler) = on_skip_frame {
            handlers.skip_frame_handlers.push(handler)
        }
        if let Some(handler) = on_render_frame {
            handlers.render_frame_handlers.push(handler)
        }
        if let Some(handler) = on_transmit_image {
            handlers.transmit_image_handlers.push(handler)
        }
        if let Some(handler) = on_transmit_failure {
            handlers.transmit_failure_handlers.push(handler)
        }
        if let Some(handler) = on_end_session {
            handlers.end_session_handlers.push(handler)
        }

        handlers
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.load_volume_handlers.is_empty()
            && self.receive_volume_handlers.is_empty()
            && self.receive_bricks_handlers.is_empty()
            && self.create_target_handlers.is_empty()
            && self.receive_transforms_handlers.is_empty()
            && self.skip_frame_handlers.is_empty()
            && self.render_frame_handlers.is_empty()
            && self.transmit_image_handlers.is_empty()
            && self.transmit_failure_handlers.is_empty()
            && self.end_session_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::LoadVolume(load_volume_event) => self
                .load_volume_handlers
                .iter()
                .for_each(|handler| handler(&load_volume_event)),

            Event::ReceiveVolume(receive_volume_event) => self
                .receive_volume_handlers
                .iter()
                .for_each(|handler| handler(&receive_volume_event)),

            Event::ReceiveBricks(receive_bricks_event) => self
                .receive_bricks_handlers
                .iter()
                .for_each(|handler| handler(&receive_bricks_event)),

            Event::CreateTarget(create_target_event) => self
                .create_target_handlers
                .iter()
                .for_each(|handler| handler(&create_target_event)),

            Event::ReceiveTransforms(receive_transforms_event) => self
                .receive_transforms_handlers
                .iter()
                .for_each(|handler| handler(&receive_transforms_event)),

            Event::SkipFrame(skip_frame_event) => self
                .skip_frame_handlers
                .iter()
                .for_each(|handler| handler(&skip_frame_event)),

            Event::RenderFrame(render_frame_event) => self
                .render_frame_handlers
                .iter()
                .for_each(|handler| handler(&render_frame_event)),

            Event::TransmitImage(transmit_image_event) => self
                .transmit_image_handlers
                .iter()
                .for_each(|handler| handler(&transmit_image_event)),

            Event::TransmitFailure(transmit_failure_event) => self
                .transmit_failure_handlers
                .iter()
                .for_each(|handler| handler(&transmit_failure_event)),

            Event::EndSession(end_session_event) => self
                .end_session_handlers
                .iter()
                .for_each(|handler| handler(&end_session_event)),
        }
    }
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => {
                // Publishers are joined before the bus is signalled; drain
                // whatever they left behind so no event goes unhandled.
                while let Ok(event) = event_subscriber.try_recv() {
                    event_handlers.fire_handlers(event)
                }
                return;
            }
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        if let Ok(event) = event_subscriber.try_recv() {
            event_handlers.fire_handlers(event)
        } else {
            thread::yield_now()
        }
    })
}
