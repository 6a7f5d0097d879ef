use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use renderslave_rs::renderer::VolumeRenderer;
use renderslave_rs::types::transforms::ViewTransformPair;

use super::target::FakeTarget;

/// A renderer fake that records the transforms it was handed and counts its
/// draw calls.
pub(crate) struct RecordingRenderer {
    remote_mode: Arc<AtomicBool>,
    transforms: Arc<Mutex<Vec<ViewTransformPair>>>,
    renders: Arc<AtomicU32>,
    pending: Option<ViewTransformPair>,
}

impl RecordingRenderer {
    pub(crate) fn new() -> RecordingRenderer {
        RecordingRenderer {
            remote_mode: Arc::new(AtomicBool::new(false)),
            transforms: Arc::new(Mutex::new(Vec::new())),
            renders: Arc::new(AtomicU32::new(0)),
            pending: None,
        }
    }

    pub(crate) fn remote_mode(&self) -> Arc<AtomicBool> {
        self.remote_mode.clone()
    }

    /// Transform pairs in the order they were drawn.
    pub(crate) fn transforms(&self) -> Arc<Mutex<Vec<ViewTransformPair>>> {
        self.transforms.clone()
    }

    pub(crate) fn renders(&self) -> Arc<AtomicU32> {
        self.renders.clone()
    }
}

impl VolumeRenderer<FakeTarget> for RecordingRenderer {
    fn set_remote_mode(&mut self, remote: bool) {
        self.remote_mode.store(remote, Ordering::SeqCst);
    }

    fn load_view_transforms(&mut self, transforms: &ViewTransformPair) {
        self.pending = Some(*transforms);
    }

    fn render_current_frame(&mut self, _target: &mut FakeTarget) {
        let pair = self.pending.take().expect("rendered without transforms");
        self.transforms.lock().unwrap().push(pair);
        self.renders.fetch_add(1, Ordering::SeqCst);
    }
}
