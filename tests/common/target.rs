use std::sync::{Arc, Mutex};

use renderslave_rs::target::{OffscreenTarget, RenderTargetError, Viewport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TargetOp {
    Prepare,
    Bind,
    Clear,
    Synchronize,
    ReadPixels,
    Unbind,
}

/// An offscreen target fake that records its operation sequence and
/// enforces the same guard states as the production target.
pub(crate) struct FakeTarget {
    viewport: Viewport,
    fill: u8,
    ops: Arc<Mutex<Vec<TargetOp>>>,
    prepared: bool,
    bound: bool,
}

impl FakeTarget {
    pub(crate) fn new(viewport: Viewport, fill: u8) -> FakeTarget {
        FakeTarget {
            viewport,
            fill,
            ops: Arc::new(Mutex::new(Vec::new())),
            prepared: false,
            bound: false,
        }
    }

    pub(crate) fn ops(&self) -> Arc<Mutex<Vec<TargetOp>>> {
        self.ops.clone()
    }
}

impl OffscreenTarget for FakeTarget {
    fn prepare_for_rendering(&mut self) -> Result<(), RenderTargetError> {
        self.prepared = true;
        self.ops.lock().unwrap().push(TargetOp::Prepare);
        Ok(())
    }

    fn bind(&mut self) -> Result<(), RenderTargetError> {
        if !self.prepared {
            return Err(RenderTargetError::NotPrepared);
        }
        if self.bound {
            return Err(RenderTargetError::AlreadyBound);
        }
        self.bound = true;
        self.ops.lock().unwrap().push(TargetOp::Bind);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), RenderTargetError> {
        if !self.bound {
            return Err(RenderTargetError::NotBound);
        }
        self.ops.lock().unwrap().push(TargetOp::Clear);
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), RenderTargetError> {
        if !self.bound {
            return Err(RenderTargetError::NotBound);
        }
        self.ops.lock().unwrap().push(TargetOp::Synchronize);
        Ok(())
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn read_pixels(&mut self) -> Result<Vec<u8>, RenderTargetError> {
        if !self.bound {
            return Err(RenderTargetError::NotBound);
        }
        self.ops.lock().unwrap().push(TargetOp::ReadPixels);
        Ok(vec![self.fill; self.viewport.rgba8_bytes()])
    }

    fn unbind(&mut self) -> Result<(), RenderTargetError> {
        if !self.bound {
            return Err(RenderTargetError::NotBound);
        }
        self.bound = false;
        self.ops.lock().unwrap().push(TargetOp::Unbind);
        Ok(())
    }
}

/// The expected operation sequence for `frames` rendered frames.
pub(crate) fn expected_ops(frames: usize) -> Vec<TargetOp> {
    let mut ops = vec![TargetOp::Prepare];
    for _ in 0..frames {
        ops.extend([
            TargetOp::Bind,
            TargetOp::Clear,
            TargetOp::Synchronize,
            TargetOp::ReadPixels,
            TargetOp::Unbind,
        ]);
    }
    ops
}
