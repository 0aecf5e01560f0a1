//! The wgpu renderer behind [`ViewerSession`](crate::session::ViewerSession).
//! One `GpuRenderer` per mounted scene; the device underneath is shared
//! between rebuilds.

pub mod context;
pub mod pipelines;
pub mod targets;

use self::{
    context::{create_surface, GpuContext, SurfaceTarget},
    pipelines::points::PointSpritePipeline,
    targets::DepthTarget,
};
use crate::{
    camera::Camera,
    data::{point_cloud::upload_point_cloud, PointCloudGpu, SceneUniform},
    scene::{SceneSetup, Viewport},
    session::{DisplaySurface, RendererFactory, SceneRenderer},
};
use anyhow::{bail, Result};
use photoscan::{RenderGeometry, Rgb};
use std::sync::Arc;
use winit::window::Window;

impl DisplaySurface for Arc<Window> {
    fn viewport(&self) -> Option<Viewport> {
        let size = self.inner_size();
        Viewport::new(size.width, size.height)
    }
}

/// Where an overlay draws: the frame's swap-chain view, after the scene.
pub struct OverlayTarget<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub size_px: [u32; 2],
}

/// Draws on top of the finished scene within the same frame.
pub trait OverlayPainter {
    fn paint(&mut self, target: &OverlayTarget<'_>, encoder: &mut wgpu::CommandEncoder);
}

/// Clear color for `bg` on a target that does (or doesn't) sRGB-encode on
/// write.
pub fn clear_color(bg: Rgb, srgb_target: bool) -> wgpu::Color {
    let decode = |c: f32| -> f64 {
        let c = c as f64;
        if !srgb_target {
            c
        } else if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    let [r, g, b] = bg.to_f32();
    wgpu::Color {
        r: decode(r),
        g: decode(g),
        b: decode(b),
        a: 1.0,
    }
}

/// Builds [`GpuRenderer`]s for a window. The GPU device is created on first
/// use and reused afterwards.
#[derive(Default)]
pub struct GpuRendererFactory {
    gpu: Option<Arc<GpuContext>>,
}

impl GpuRendererFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gpu(&self) -> Option<&Arc<GpuContext>> {
        self.gpu.as_ref()
    }
}

impl RendererFactory<Arc<Window>> for GpuRendererFactory {
    type Renderer = GpuRenderer;

    fn create(&mut self, window: &Arc<Window>, setup: &SceneSetup) -> Result<GpuRenderer> {
        let (gpu, surface) = match &self.gpu {
            Some(gpu) => (gpu.clone(), create_surface(&gpu.instance, window)?),
            None => {
                let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
                let surface = create_surface(&instance, window)?;
                let gpu = Arc::new(pollster::block_on(GpuContext::new(instance, &surface))?);
                self.gpu = Some(gpu.clone());
                (gpu, surface)
            }
        };

        let Viewport { width, height } = setup.viewport;
        let target = SurfaceTarget::new(&gpu, surface, width, height)?;
        let depth = DepthTarget::new(&gpu.device, width, height);
        let points = PointSpritePipeline::new(&gpu.device, target.format(), depth.format);

        log::debug!(
            "Renderer created: {:?} {}x{}, background {}, lights {:?}",
            target.format(),
            width,
            height,
            setup.background,
            setup.lights
        );

        Ok(GpuRenderer {
            clear: clear_color(setup.background, target.format().is_srgb()),
            viewport: setup.viewport,
            gpu,
            target,
            depth,
            points,
        })
    }
}

pub struct GpuRenderer {
    gpu: Arc<GpuContext>,
    target: SurfaceTarget,
    depth: DepthTarget,
    points: PointSpritePipeline,
    clear: wgpu::Color,
    viewport: Viewport,
}

impl GpuRenderer {
    /// Runs `f` inside validation and out-of-memory error scopes and turns a
    /// captured error into `Err`.
    fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> Result<T>) -> Result<T> {
        let device = &self.gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f(device);
        let validation = pollster::block_on(device.pop_error_scope());
        let oom = pollster::block_on(device.pop_error_scope());

        if let Some(e) = oom.or(validation) {
            bail!("GPU error: {e}");
        }
        out
    }

    /// Leaves the surface showing only the background, so no stale frame
    /// outlives the scene. Best effort: a surface that cannot hand out a
    /// frame is skipped.
    fn present_clear(&self) {
        let frame = match self.target.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("Skipping final clear: {e}");
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }
}

impl SceneRenderer for GpuRenderer {
    type Points = PointCloudGpu;
    type Overlay = dyn OverlayPainter;

    fn resize(&mut self, viewport: Viewport) {
        let device = &self.gpu.device;
        self.target.resize(device, viewport.width, viewport.height);
        self.depth.resize(device, viewport.width, viewport.height);
        self.viewport = viewport;
    }

    fn upload_points(&mut self, geometry: &RenderGeometry, point_size: f32) -> Result<PointCloudGpu> {
        let layout = &self.points.cloud_layout;
        self.scoped(|device| upload_point_cloud(device, layout, geometry, point_size))
    }

    fn release_points(&mut self, points: PointCloudGpu) -> Result<()> {
        points.release();
        Ok(())
    }

    fn render(
        &mut self,
        camera: &Camera,
        points: Option<&PointCloudGpu>,
        overlay: &mut Self::Overlay,
    ) -> Result<()> {
        let frame = match self.target.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated; reconfiguring");
                self.target.reconfigure(&self.gpu.device);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface acquire timed out; skipping frame");
                return Ok(());
            }
            Err(e) => bail!("Cannot acquire frame: {e}"),
        };
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let scene = SceneUniform::new(camera, self.viewport.size_f32());
        self.points.write_scene(&self.gpu.queue, &scene);

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Point Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(cloud) = points {
                self.points.draw(&mut pass, cloud);
            }
        }

        overlay.paint(
            &OverlayTarget {
                device: &self.gpu.device,
                queue: &self.gpu.queue,
                view: &swap_view,
                format: self.target.format(),
                size_px: self.target.size(),
            },
            &mut encoder,
        );

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn dispose(self) {
        self.present_clear();
        self.depth.destroy();
        log::debug!("Renderer disposed");
    }
}
