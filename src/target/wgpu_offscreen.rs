//! wgpu-backed offscreen render target.
//!
//! The color attachment lives in a plain 2D texture with no surface or
//! swapchain attached; readback goes through a persistent staging buffer
//! with 256-byte-aligned rows, stripped to a tight RGBA8 layout on the CPU
//! side.

use std::sync::mpsc;

use super::{OffscreenTarget, PixelFormat, RenderTargetError, Viewport};

/// wgpu requires buffer→texture copy rows to be aligned to this many bytes.
const COPY_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

/// The GPU context an offscreen target renders with: adapter, device and
/// queue.
///
/// Acquiring a context is expensive (instance plus device initialization);
/// a slave process acquires one per session. The wrapped device and queue
/// are exposed so the renderer implementation can build its pipelines
/// against the same device the target's texture belongs to.
pub struct WgpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
    // Declared last: the instance must outlive device and queue.
    _instance: wgpu::Instance,
}

impl WgpuContext {
    /// Acquire a context on the best available adapter.
    ///
    /// Adapters are picked in tiers: real hardware (discrete, then
    /// integrated) first, virtual or driver-translated adapters second.
    /// Software rasterizers are only used when nothing else exists.
    pub fn acquire() -> Result<WgpuContext, RenderTargetError> {
        pollster::block_on(Self::acquire_async())
    }

    async fn acquire_async() -> Result<WgpuContext, RenderTargetError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(wgpu::Backends::PRIMARY);
        if adapters.is_empty() {
            return Err(RenderTargetError::NoSuitableAdapter);
        }

        let tier = |device_type: wgpu::DeviceType| match device_type {
            wgpu::DeviceType::DiscreteGpu => 0,
            wgpu::DeviceType::IntegratedGpu => 1,
            wgpu::DeviceType::VirtualGpu | wgpu::DeviceType::Other => 2,
            wgpu::DeviceType::Cpu => 3,
        };
        let adapter = adapters
            .into_iter()
            .min_by_key(|a| tier(a.get_info().device_type))
            .ok_or(RenderTargetError::NoSuitableAdapter)?;

        let adapter_name = adapter.get_info().name;
        log::info!("offscreen rendering on adapter: {adapter_name}");

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("renderslave"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(RenderTargetError::DeviceRequest)?;

        Ok(WgpuContext {
            device,
            queue,
            adapter_name,
            _instance: instance,
        })
    }
}

/// An [`OffscreenTarget`] backed by a wgpu color texture.
///
/// `create` fixes the resolution (the base viewport scaled by `scale`) and
/// pixel format for the lifetime of the target; `prepare_for_rendering`
/// allocates the texture and the readback staging buffer. All GPU resources
/// are released on drop.
pub struct WgpuOffscreenTarget {
    context: WgpuContext,
    format: PixelFormat,
    viewport: Viewport,
    aligned_bytes_per_row: u32,
    color: Option<ColorAttachment>,
    readback: Option<wgpu::Buffer>,
    bound: bool,
}

struct ColorAttachment {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl WgpuOffscreenTarget {
    /// Acquire a fresh GPU context and build a target at
    /// `scale x base_viewport` resolution.
    pub fn create(
        scale: f32,
        format: PixelFormat,
        base_viewport: Viewport,
    ) -> Result<WgpuOffscreenTarget, RenderTargetError> {
        Self::with_context(WgpuContext::acquire()?, scale, format, base_viewport)
    }

    /// Build a target on an existing context.
    pub fn with_context(
        context: WgpuContext,
        scale: f32,
        format: PixelFormat,
        base_viewport: Viewport,
    ) -> Result<WgpuOffscreenTarget, RenderTargetError> {
        let viewport = base_viewport.scaled(scale);
        let aligned_bytes_per_row = align_to(viewport.width * 4, COPY_ALIGNMENT);
        Ok(WgpuOffscreenTarget {
            context,
            format,
            viewport,
            aligned_bytes_per_row,
            color: None,
            readback: None,
            bound: false,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.context.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.context.queue
    }

    /// The color attachment view renderers draw into. `None` before
    /// `prepare_for_rendering`.
    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.color.as_ref().map(|c| &c.view)
    }

    fn texture_format(&self) -> wgpu::TextureFormat {
        match self.format {
            PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            PixelFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
        }
    }
}

impl OffscreenTarget for WgpuOffscreenTarget {
    fn prepare_for_rendering(&mut self) -> Result<(), RenderTargetError> {
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen color"),
            size: wgpu::Extent3d {
                width: self.viewport.width,
                height: self.viewport.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.texture_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.color = Some(ColorAttachment { texture, view });

        self.readback = Some(self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("offscreen readback"),
            size: self.aligned_bytes_per_row as u64 * self.viewport.height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        Ok(())
    }

    fn bind(&mut self) -> Result<(), RenderTargetError> {
        if self.color.is_none() {
            return Err(RenderTargetError::NotPrepared);
        }
        if self.bound {
            return Err(RenderTargetError::AlreadyBound);
        }
        self.bound = true;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), RenderTargetError> {
        if !self.bound {
            return Err(RenderTargetError::NotBound);
        }
        let color = self.color.as_ref().ok_or(RenderTargetError::NotPrepared)?;

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("offscreen clear"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("offscreen clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &color.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.context.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn synchronize(&mut self) -> Result<(), RenderTargetError> {
        if !self.bound {
            return Err(RenderTargetError::NotBound);
        }
        self.context.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn read_pixels(&mut self) -> Result<Vec<u8>, RenderTargetError> {
        if !self.bound {
            return Err(RenderTargetError::NotBound);
        }
        let color = self.color.as_ref().ok_or(RenderTargetError::NotPrepared)?;
        let readback = self.readback.as_ref().ok_or(RenderTargetError::NotPrepared)?;

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("offscreen readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &color.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: self.viewport.x,
                    y: self.viewport.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(self.aligned_bytes_per_row),
                    rows_per_image: Some(self.viewport.height),
                },
            },
            wgpu::Extent3d {
                width: self.viewport.width,
                height: self.viewport.height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        // map_async is asynchronous by API shape; block on it via poll(Wait).
        let slice = readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context.device.poll(wgpu::Maintain::Wait);
        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(RenderTargetError::Readback(e)),
            Err(_) => return Err(RenderTargetError::Readback(wgpu::BufferAsyncError)),
        }

        // Strip row alignment padding into a tight RGBA8 buffer.
        let row_bytes = self.viewport.width as usize * 4;
        let mut pixels = vec![0u8; self.viewport.rgba8_bytes()];
        {
            let mapped = slice.get_mapped_range();
            for y in 0..self.viewport.height as usize {
                let src = y * self.aligned_bytes_per_row as usize;
                let dst = y * row_bytes;
                pixels[dst..dst + row_bytes].copy_from_slice(&mapped[src..src + row_bytes]);
            }
        }
        readback.unmap();

        if self.format == PixelFormat::Bgra8 {
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }
        Ok(pixels)
    }

    fn unbind(&mut self) -> Result<(), RenderTargetError> {
        if !self.bound {
            return Err(RenderTargetError::NotBound);
        }
        self.bound = false;
        Ok(())
    }
}

/// Round `value` up to the next multiple of `alignment`.
#[inline]
fn align_to(value: u32, alignment: u32) -> u32 {
    (value + alignment - 1) / alignment * alignment
}
