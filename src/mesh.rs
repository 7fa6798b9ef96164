use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use std::path::Path;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// CPU-side mesh. Uploaded once by the renderer; the optional texture is
/// decoded at load time so a failure shows up during the Loading phase.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub texture: Option<image::RgbaImage>,
}

impl MeshData {
    pub fn bound_radius(&self) -> f32 {
        self.vertices
            .iter()
            .map(|v| Vec3::from_array(v.position).length())
            .fold(0.0, f32::max)
    }

    /// UV sphere centered at the origin.
    pub fn sphere(radius: f32, rings: u32, segments: u32) -> Self {
        let rings = rings.max(3);
        let segments = segments.max(3);
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            for segment in 0..=segments {
                let theta = std::f32::consts::TAU * segment as f32 / segments as f32;
                let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                vertices.push(MeshVertex {
                    position: (normal * radius).to_array(),
                    normal: normal.to_array(),
                    uv: [segment as f32 / segments as f32, ring as f32 / rings as f32],
                });
            }
        }
        let stride = segments + 1;
        for ring in 0..rings {
            for segment in 0..segments {
                let a = ring * stride + segment;
                let b = a + stride;
                indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }
        Self { vertices, indices, texture: None }
    }

    /// Axis-aligned box centered at the origin.
    pub fn cuboid(half: Vec3) -> Self {
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (-Vec3::X, Vec3::Y, -Vec3::Z),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (-Vec3::Y, Vec3::Z, -Vec3::X),
            (Vec3::Z, Vec3::Y, -Vec3::X),
            (-Vec3::Z, Vec3::Y, Vec3::X),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, up, right) in faces {
            let base = vertices.len() as u32;
            let face_center = normal * half;
            for (du, dv, uv) in [
                (-1.0, -1.0, [0.0, 1.0]),
                (1.0, -1.0, [1.0, 1.0]),
                (1.0, 1.0, [1.0, 0.0]),
                (-1.0, 1.0, [0.0, 0.0]),
            ] {
                let position = face_center + right * half * du + up * half * dv;
                vertices.push(MeshVertex { position: position.to_array(), normal: normal.to_array(), uv });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self { vertices, indices, texture: None }
    }

    /// Thin square prism from `from` to `to`, used for commit edges.
    pub fn segment(from: Vec3, to: Vec3, thickness: f32) -> Self {
        let axis = to - from;
        let length = axis.length();
        if length < 1e-6 {
            return Self::default();
        }
        let dir = axis / length;
        let side = if dir.dot(Vec3::Y).abs() > 0.99 { Vec3::X } else { Vec3::Y };
        let u = dir.cross(side).normalize() * (thickness * 0.5);
        let v = dir.cross(u).normalize() * (thickness * 0.5);
        let mut mesh = Self::default();
        let ring = |center: Vec3| [center + u + v, center - u + v, center - u - v, center + u - v];
        let a = ring(from);
        let b = ring(to);
        for i in 0..4usize {
            let j = (i + 1) % 4;
            let base = mesh.vertices.len() as u32;
            let normal = (a[i] - from).normalize().to_array();
            for p in [a[i], a[j], b[j], b[i]] {
                mesh.vertices.push(MeshVertex { position: p.to_array(), normal, uv: [0.0, 0.0] });
            }
            mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }
}

/// Flattened node from a gltf document; `parent` indexes into the import's
/// node list.
#[derive(Debug, Clone)]
pub struct GltfNode {
    pub name: String,
    pub parent: Option<usize>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub mesh: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct GltfImport {
    pub nodes: Vec<GltfNode>,
    pub meshes: Vec<MeshData>,
    pub animations: Vec<String>,
}

pub fn load_gltf(path: &Path) -> Result<GltfImport> {
    let (document, buffers, images) =
        gltf::import(path).with_context(|| format!("Importing gltf {}", path.display()))?;

    let mut meshes = Vec::new();
    let mut mesh_slots = vec![None; document.meshes().len()];
    for mesh in document.meshes() {
        let mut data = MeshData::default();
        for primitive in mesh.primitives() {
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));
            let Some(positions) = reader.read_positions() else { continue };
            let positions: Vec<[f32; 3]> = positions.collect();
            let normals: Vec<[f32; 3]> = reader
                .read_normals()
                .map(|iter| iter.collect())
                .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);
            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|tc| tc.into_f32().collect())
                .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);
            let base = data.vertices.len() as u32;
            for (i, position) in positions.iter().enumerate() {
                data.vertices.push(MeshVertex {
                    position: *position,
                    normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                    uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
                });
            }
            match reader.read_indices() {
                Some(read) => data.indices.extend(read.into_u32().map(|i| base + i)),
                None => data.indices.extend(base..base + positions.len() as u32),
            }
            if data.texture.is_none() {
                data.texture = primitive
                    .material()
                    .pbr_metallic_roughness()
                    .base_color_texture()
                    .and_then(|info| images.get(info.texture().source().index()))
                    .and_then(decode_gltf_image);
            }
        }
        mesh_slots[mesh.index()] = Some(meshes.len());
        meshes.push(data);
    }

    let mut nodes = Vec::new();
    let mut stack: Vec<(gltf::Node, Option<usize>)> = Vec::new();
    for scene in document.scenes() {
        for node in scene.nodes() {
            stack.push((node, None));
        }
    }
    while let Some((node, parent)) = stack.pop() {
        let (translation, rotation, scale) = node.transform().decomposed();
        let index = nodes.len();
        nodes.push(GltfNode {
            name: node.name().unwrap_or("unnamed").to_string(),
            parent,
            translation: Vec3::from_array(translation),
            rotation: Quat::from_array(rotation),
            scale: Vec3::from_array(scale),
            mesh: node.mesh().and_then(|m| mesh_slots[m.index()]),
        });
        for child in node.children() {
            stack.push((child, Some(index)));
        }
    }

    let animations = document
        .animations()
        .map(|anim| anim.name().unwrap_or("unnamed").to_string())
        .collect();

    Ok(GltfImport { nodes, meshes, animations })
}

fn decode_gltf_image(data: &gltf::image::Data) -> Option<image::RgbaImage> {
    use gltf::image::Format;
    match data.format {
        Format::R8G8B8A8 => image::RgbaImage::from_raw(data.width, data.height, data.pixels.clone()),
        Format::R8G8B8 => {
            let rgb = image::RgbImage::from_raw(data.width, data.height, data.pixels.clone())?;
            Some(image::DynamicImage::ImageRgb8(rgb).to_rgba8())
        }
        _ => {
            eprintln!("[mesh] unsupported texture format {:?}, skipping", data.format);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_bound_matches_radius() {
        let sphere = MeshData::sphere(0.05, 8, 12);
        assert!((sphere.bound_radius() - 0.05).abs() < 1e-4);
        assert!(!sphere.indices.is_empty());
        assert_eq!(sphere.indices.len() % 3, 0);
    }

    #[test]
    fn cuboid_has_six_faces() {
        let cuboid = MeshData::cuboid(Vec3::new(0.05, 1.5, 2.0));
        assert_eq!(cuboid.vertices.len(), 24);
        assert_eq!(cuboid.indices.len(), 36);
    }

    #[test]
    fn segment_spans_endpoints() {
        let seg = MeshData::segment(Vec3::ZERO, Vec3::new(0.0, 0.6, 0.0), 0.02);
        let max_y = seg.vertices.iter().map(|v| v.position[1]).fold(f32::MIN, f32::max);
        let min_y = seg.vertices.iter().map(|v| v.position[1]).fold(f32::MAX, f32::min);
        assert!((max_y - 0.6).abs() < 0.02);
        assert!(min_y.abs() < 0.02);
    }

    #[test]
    fn degenerate_segment_is_empty() {
        let seg = MeshData::segment(Vec3::ONE, Vec3::ONE, 0.02);
        assert!(seg.vertices.is_empty());
    }
}
