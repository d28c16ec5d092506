// mesh.rs — inverted UV sphere for equirectangular panoramas
//
// X is mirrored so triangles are counter-clockwise when seen from the centre;
// with back-face culling only the inner surface is drawn and the image is not
// mirrored. UV (0,0) is the top-left of the image.

use std::f32::consts::{PI, TAU};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SphereVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl SphereVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SphereVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub vertices: Vec<SphereVertex>,
    pub indices: Vec<u32>,
}

pub fn build_inverted_sphere(radius: f32, width_segments: u32, height_segments: u32) -> SphereMesh {
    let lon = width_segments.max(3) as usize;
    let lat = height_segments.max(2) as usize;

    let mut vertices = Vec::with_capacity((lat + 1) * (lon + 1));
    let mut indices = Vec::with_capacity(lat * lon * 6);

    for i in 0..=lat {
        let v = i as f32 / lat as f32;
        let theta = PI * v;
        let y = radius * theta.cos();
        let sin_t = theta.sin();

        for j in 0..=lon {
            let u = j as f32 / lon as f32;
            let phi = TAU * u;

            // Outward sphere has x = -r cos(phi) sin(theta); mirrored here.
            let x = radius * phi.cos() * sin_t;
            let z = radius * phi.sin() * sin_t;

            vertices.push(SphereVertex {
                position: [x, y, z],
                uv: [u, v],
            });
        }
    }

    let row = lon + 1;
    for i in 0..lat {
        for j in 0..lon {
            let a = (i * row + j + 1) as u32;
            let b = (i * row + j) as u32;
            let c = ((i + 1) * row + j) as u32;
            let d = ((i + 1) * row + j + 1) as u32;

            // Skip the degenerate triangle at each pole.
            if i != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if i != lat - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    SphereMesh { vertices, indices }
}
