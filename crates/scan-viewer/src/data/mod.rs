//! Point cloud data on its way to the GPU.
//!
//! - `types`: buffer layouts shared with the WGSL.
//! - `point_cloud`: interleaving `RenderGeometry` into instances and uploading.

pub mod point_cloud;
pub mod types;

pub use self::types::{CloudUniform, PointCloudGpu, PointInstance, SceneUniform};
