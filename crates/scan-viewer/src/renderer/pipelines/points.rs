//! Instanced, size-attenuated round point sprites. Unlit: a point shows its
//! own color and nothing else.

use crate::data::types::{CloudUniform, PointCloudGpu, PointInstance, SceneUniform};
use wgpu::util::DeviceExt;

pub struct PointSpritePipeline {
    pipeline: wgpu::RenderPipeline,
    pub cloud_layout: wgpu::BindGroupLayout,
    scene_bind: wgpu::BindGroup,
    scene_ubo: wgpu::Buffer,
    quad_vb: wgpu::Buffer,
}

impl PointSpritePipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let uniform_layout = |label: &str, size: usize, visibility: wgpu::ShaderStages| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(size as u64),
                    },
                    count: None,
                }],
            })
        };

        let scene_layout = uniform_layout(
            "Scene UBO Layout",
            std::mem::size_of::<SceneUniform>(),
            wgpu::ShaderStages::VERTEX,
        );
        let cloud_layout = uniform_layout(
            "Point Cloud UBO Layout",
            std::mem::size_of::<CloudUniform>(),
            wgpu::ShaderStages::VERTEX,
        );

        let scene_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene UBO"),
            size: std::mem::size_of::<SceneUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let scene_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene BindGroup"),
            layout: &scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_ubo.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Point Sprite WGSL"),
            source: wgpu::ShaderSource::Wgsl(POINTS_WGSL.into()),
        });

        // Two triangles spanning the unit sprite.
        let quad_corners: [[f32; 2]; 6] = [
            [-1.0, -1.0],
            [1.0, -1.0],
            [1.0, 1.0],
            [-1.0, -1.0],
            [1.0, 1.0],
            [-1.0, 1.0],
        ];
        let quad_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Point Sprite Quad VB"),
            contents: bytemuck::cast_slice(&quad_corners),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let vbuf_layouts = [
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    shader_location: 0,
                    offset: 0,
                    format: wgpu::VertexFormat::Float32x2,
                }],
            },
            wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<PointInstance>() as u64,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes: &[
                    // position
                    wgpu::VertexAttribute {
                        shader_location: 1,
                        offset: 0,
                        format: wgpu::VertexFormat::Float32x3,
                    },
                    // color
                    wgpu::VertexAttribute {
                        shader_location: 2,
                        offset: 12,
                        format: wgpu::VertexFormat::Float32x3,
                    },
                ],
            },
        ];

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Point Sprite PipelineLayout"),
            bind_group_layouts: &[&scene_layout, &cloud_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Point Sprite Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &vbuf_layouts,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            cloud_layout,
            scene_bind,
            scene_ubo,
            quad_vb,
        }
    }

    pub fn write_scene(&self, queue: &wgpu::Queue, scene: &SceneUniform) {
        queue.write_buffer(&self.scene_ubo, 0, bytemuck::bytes_of(scene));
    }

    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>, cloud: &'a PointCloudGpu) {
        let Some(vtx) = cloud.vtx.as_ref() else {
            return;
        };
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.scene_bind, &[]);
        rpass.set_bind_group(1, &cloud.bind, &[]);
        rpass.set_vertex_buffer(0, self.quad_vb.slice(..));
        rpass.set_vertex_buffer(1, vtx.slice(..));
        rpass.draw(0..6, 0..cloud.instances_len);
    }
}

pub const POINTS_WGSL: &str = r#"
struct SceneUniform {
    view_proj:  mat4x4<f32>,
    viewport:   vec2<f32>,
    _pad0:      vec2<f32>,
};
@group(0) @binding(0) var<uniform> S: SceneUniform;

struct CloudUniform {
    point_size: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};
@group(1) @binding(0) var<uniform> C: CloudUniform;

struct VSOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv:    vec2<f32>,
    @location(1) color: vec3<f32>,
}

@vertex
fn vs_main(
    @location(0) corner:   vec2<f32>,
    @location(1) position: vec3<f32>,
    @location(2) color:    vec3<f32>,
) -> VSOut {
    var out: VSOut;
    var clip = S.view_proj * vec4<f32>(position, 1.0);
    // Pixel diameter is point_size * (viewport_h / 2) / depth; the clip-space
    // offset below is that, pre-multiplied by w.
    let half_clip = C.point_size * S.viewport.y * 0.5 / S.viewport;
    clip = vec4<f32>(clip.xy + corner * half_clip, clip.zw);
    out.clip  = clip;
    out.uv    = corner;
    out.color = color;
    return out;
}

fn srgb_to_linear(c: vec3<f32>) -> vec3<f32> {
    let lo = c / 12.92;
    let hi = pow((max(c, vec3<f32>(0.0)) + 0.055) / 1.055, vec3<f32>(2.4));
    return select(hi, lo, c <= vec3<f32>(0.04045));
}

@fragment
fn fs_main(in: VSOut) -> @location(0) vec4<f32> {
    if (dot(in.uv, in.uv) > 1.0) {
        discard;
    }
    return vec4<f32>(srgb_to_linear(in.color), 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn wgsl_struct_size(name: &str) -> usize {
        let head = format!("struct {name} {{");
        let body = POINTS_WGSL
            .split_once(head.as_str())
            .and_then(|(_, rest)| rest.split_once("};"))
            .map(|(body, _)| body)
            .unwrap();
        body.lines()
            .filter_map(|l| l.split_once(':').map(|(_, ty)| ty.trim().trim_end_matches(',')))
            .map(|ty| match ty {
                "mat4x4<f32>" => 64,
                "vec4<f32>" => 16,
                "vec2<f32>" => 8,
                "f32" => 4,
                other => panic!("unexpected WGSL type {other}"),
            })
            .sum()
    }

    #[test]
    fn wgsl_uniforms_match_rust_layouts() {
        assert_eq!(
            wgsl_struct_size("SceneUniform"),
            std::mem::size_of::<SceneUniform>()
        );
        assert_eq!(
            wgsl_struct_size("CloudUniform"),
            std::mem::size_of::<CloudUniform>()
        );
    }

    #[test]
    fn fragment_stage_outputs_the_point_color_only() {
        let (_, fs) = POINTS_WGSL.split_once("@fragment").unwrap();
        assert!(!fs.contains("S."), "fragment stage reads scene uniforms");
        assert!(fs.contains("srgb_to_linear(in.color), 1.0"));
    }
}
