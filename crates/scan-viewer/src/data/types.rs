//! GPU-side data layouts. Must match the structs in the point sprite WGSL.

use crate::camera::Camera;
use glam::Mat4;

/// Per-instance data of the point vertex buffer.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct PointInstance {
    /// World-space position.
    pub position: [f32; 3],
    /// sRGB display color; values above 1 are clipped by the target.
    pub color: [f32; 3],
}

/// Frame-wide uniform: camera and viewport, std140.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug)]
pub struct SceneUniform {
    pub view_proj: [[f32; 4]; 4], // 64
    /// Viewport size in physical pixels.
    pub viewport: [f32; 2],
    pub _pad0: [f32; 2], // 80
}

const _: [(); 80] = [(); core::mem::size_of::<SceneUniform>()];

impl SceneUniform {
    pub fn new(camera: &Camera, viewport: [f32; 2]) -> Self {
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
            viewport,
            _pad0: [0.0; 2],
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.view_proj)
    }
}

/// Per-cloud uniform.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug)]
pub struct CloudUniform {
    /// Sprite diameter in world units (size-attenuated).
    pub point_size: f32,
    pub _pad: [f32; 3],
}

const _: [(); 16] = [(); core::mem::size_of::<CloudUniform>()];

/// All GPU resources of one uploaded point cloud.
#[derive(Debug)]
pub struct PointCloudGpu {
    pub instances_len: u32,
    pub point_size: f32,

    /// `None` for an empty cloud; zero-sized vertex buffers are not allowed.
    pub vtx: Option<wgpu::Buffer>,
    pub ubo: wgpu::Buffer,
    pub bind: wgpu::BindGroup,
}

impl PointCloudGpu {
    /// Frees the buffers now instead of when the last handle drops.
    pub fn release(self) {
        if let Some(vtx) = &self.vtx {
            vtx.destroy();
        }
        self.ubo.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_proj_round_trips_through_the_uniform() {
        let cam = Camera::new(2.0);
        let u = SceneUniform::new(&cam, [2.0, 1.0]);
        assert_eq!(u.viewport, [2.0, 1.0]);
        assert!(u.view_proj().abs_diff_eq(cam.view_proj(), 1e-6));
    }
}
