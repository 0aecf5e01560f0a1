use crate::data::types::{CloudUniform, PointCloudGpu, PointInstance};
use anyhow::{ensure, Result};
use photoscan::RenderGeometry;
use rayon::prelude::*;
use wgpu::util::DeviceExt;

/// Interleaves the parallel vertex/color arrays into instance records.
pub fn instances_from_geometry(geometry: &RenderGeometry) -> Vec<PointInstance> {
    geometry
        .vertices()
        .par_chunks_exact(3)
        .zip(geometry.colors().par_chunks_exact(3))
        .map(|(p, c)| PointInstance {
            position: [p[0], p[1], p[2]],
            color: [c[0], c[1], c[2]],
        })
        .collect()
}

/// Uploads `geometry` as one instanced sprite batch drawn at `point_size`.
pub fn upload_point_cloud(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    geometry: &RenderGeometry,
    point_size: f32,
) -> Result<PointCloudGpu> {
    ensure!(
        point_size.is_finite() && point_size > 0.0,
        "point size must be positive, got {point_size}"
    );
    let instances_len = u32::try_from(geometry.len())?;

    let instances = instances_from_geometry(geometry);
    let vtx = (!instances.is_empty()).then(|| {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Point Cloud Instances"),
            contents: bytemuck::cast_slice(&instances),
            usage: wgpu::BufferUsages::VERTEX,
        })
    });

    let uniform = CloudUniform {
        point_size,
        _pad: [0.0; 3],
    };
    let ubo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Point Cloud UBO"),
        contents: bytemuck::bytes_of(&uniform),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Point Cloud BindGroup"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: ubo.as_entire_binding(),
        }],
    });

    log::debug!(
        "Uploaded {} points ({} KiB)",
        instances_len,
        instances.len() * std::mem::size_of::<PointInstance>() / 1024
    );

    Ok(PointCloudGpu {
        instances_len,
        point_size,
        vtx,
        ubo,
        bind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaves_in_point_order() {
        let g = RenderGeometry::from_parts(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
        )
        .unwrap();

        let inst = instances_from_geometry(&g);
        assert_eq!(
            inst,
            vec![
                PointInstance {
                    position: [1.0, 2.0, 3.0],
                    color: [0.1, 0.2, 0.3],
                },
                PointInstance {
                    position: [4.0, 5.0, 6.0],
                    color: [0.4, 0.5, 0.6],
                },
            ]
        );
    }

    #[test]
    fn empty_geometry_has_no_instances() {
        assert!(instances_from_geometry(&RenderGeometry::empty()).is_empty());
    }
}
