use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use renderslave_rs::renderer::{LoadError, VolumeLoader};
use renderslave_rs::types::volume::VolumeDataset;

/// A loader stub: either fills in a fixed dataset or fails like a missing
/// file.
pub(crate) struct StubLoader {
    fail: bool,
    calls: Arc<AtomicU32>,
}

impl StubLoader {
    pub(crate) fn succeeding() -> StubLoader {
        StubLoader {
            fail: false,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub(crate) fn failing() -> StubLoader {
        StubLoader {
            fail: true,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub(crate) fn calls(&self) -> Arc<AtomicU32> {
        self.calls.clone()
    }
}

impl VolumeLoader for StubLoader {
    fn load_volume(&mut self, dataset: &mut VolumeDataset) -> Result<(), LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LoadError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no such file",
            )));
        }
        dataset.vox = [8, 8, 8];
        dataset.frames = 1;
        dataset.voxels = vec![0x11; 512];
        Ok(())
    }
}
