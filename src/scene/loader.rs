//! glTF import into CPU-side mesh data.
//!
//! Only the resulting vertices, indices, materials and decoded images leave
//! this module; the importer's document and node graph do not.

use std::path::Path;

use glam::{Mat3, Mat4, Vec2, Vec3};

use crate::error::ResourceError;
use crate::renderer::material::Material;
use crate::renderer::mesh::TextureRole;
use crate::renderer::vertex::Vertex;

/// One triangle mesh ready for upload.
#[derive(Debug, Clone)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Material,
    /// Indices into [`ModelData::images`].
    pub textures: Vec<(TextureRole, usize)>,
}

#[derive(Debug, Clone, Default)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
    /// Decoded images shared by every mesh of the model; `None` where the
    /// pixel format could not be converted to RGBA8.
    pub images: Vec<Option<image::RgbaImage>>,
}

pub fn load_model(path: impl AsRef<Path>) -> Result<ModelData, ResourceError> {
    let path = path.as_ref();
    log::info!("Loading model: {:?}", path);

    let (document, buffers, images) =
        gltf::import(path).map_err(|source| ResourceError::ModelImport {
            path: path.to_path_buf(),
            source,
        })?;

    let images = images.iter().map(to_rgba8).collect::<Vec<_>>();

    let mut meshes = Vec::new();
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next());
    let visited = match scene {
        Some(scene) => scene
            .nodes()
            .try_for_each(|node| visit_node(&node, Mat4::IDENTITY, &buffers, &mut meshes)),
        None => document
            .meshes()
            .try_for_each(|mesh| load_mesh(&mesh, Mat4::IDENTITY, &buffers, &mut meshes)),
    };
    visited.map_err(|reason| ResourceError::MalformedMesh {
        path: path.to_path_buf(),
        reason,
    })?;

    if meshes.is_empty() {
        return Err(ResourceError::EmptyModel(path.to_path_buf()));
    }

    log::info!(
        "  {} meshes, {} images from {:?}",
        meshes.len(),
        images.len(),
        path
    );
    Ok(ModelData { meshes, images })
}

fn visit_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<MeshData>,
) -> Result<(), String> {
    let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        load_mesh(&mesh, transform, buffers, out)?;
    }
    node.children()
        .try_for_each(|child| visit_node(&child, transform, buffers, out))
}

fn load_mesh(
    mesh: &gltf::Mesh,
    transform: Mat4,
    buffers: &[gltf::buffer::Data],
    out: &mut Vec<MeshData>,
) -> Result<(), String> {
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::debug!(
                "  Skipping non-triangle primitive in mesh {:?}",
                mesh.name()
            );
            continue;
        }
        match load_primitive(&primitive, transform, buffers) {
            Ok(Some(data)) => out.push(data),
            Ok(None) => log::warn!("  Primitive of mesh {:?} has no positions", mesh.name()),
            Err(reason) => return Err(format!("mesh {:?}: {reason}", mesh.name())),
        }
    }
    Ok(())
}

fn load_primitive(
    primitive: &gltf::Primitive,
    transform: Mat4,
    buffers: &[gltf::buffer::Data],
) -> Result<Option<MeshData>, String> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));

    let Some(positions) = reader.read_positions() else {
        return Ok(None);
    };
    let positions = positions.collect::<Vec<_>>();
    let count = positions.len();

    let normals = reader
        .read_normals()
        .map(|n| n.collect::<Vec<_>>())
        .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; count]);

    let uvs = reader
        .read_tex_coords(0)
        .map(|uv| uv.into_f32().collect::<Vec<_>>())
        .unwrap_or_else(|| vec![[0.0, 0.0]; count]);

    let indices = reader
        .read_indices()
        .map(|i| i.into_u32().collect::<Vec<_>>())
        .unwrap_or_else(|| (0..count as u32).collect());

    check_attributes(count, &normals, &uvs, &indices)?;

    let tangents = match reader.read_tangents() {
        Some(tangents) => {
            let tangents = tangents.collect::<Vec<_>>();
            check_count("TANGENT", tangents.len(), count)?;
            tangents
        }
        None => {
            log::debug!("    No tangents in glTF, generating them");
            generate_tangents(&positions, &normals, &uvs, &indices)
        }
    };

    let linear = Mat3::from_mat4(transform);
    let normal_matrix = linear.inverse().transpose();
    let vertices = (0..count)
        .map(|i| {
            let position = transform.transform_point3(Vec3::from(positions[i]));
            let normal = (normal_matrix * Vec3::from(normals[i])).normalize_or_zero();
            let [tx, ty, tz, w] = tangents[i];
            let tangent = (linear * Vec3::new(tx, ty, tz)).normalize_or_zero();
            Vertex {
                position: position.to_array(),
                normal: normal.to_array(),
                uv: uvs[i],
                tangent: tangent.to_array(),
                bitangent: (normal.cross(tangent) * w).to_array(),
            }
        })
        .collect::<Vec<_>>();

    let gltf_material = primitive.material();
    let pbr = gltf_material.pbr_metallic_roughness();
    let material = Material::from_pbr(
        pbr.base_color_factor(),
        pbr.metallic_factor(),
        pbr.roughness_factor(),
    );

    let mut textures = Vec::new();
    if let Some(info) = pbr.base_color_texture() {
        textures.push((TextureRole::Diffuse, info.texture().source().index()));
    }
    if let Some(info) = pbr.metallic_roughness_texture() {
        textures.push((TextureRole::Specular, info.texture().source().index()));
    }
    if let Some(normal) = gltf_material.normal_texture() {
        textures.push((TextureRole::Normal, normal.texture().source().index()));
    }

    log::trace!(
        "    Primitive: {} vertices, {} indices",
        vertices.len(),
        indices.len()
    );

    Ok(Some(MeshData {
        vertices,
        indices,
        material,
        textures,
    }))
}

/// Every per-vertex attribute must cover all `count` positions and every
/// index must address one of them.
fn check_attributes(
    count: usize,
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
    indices: &[u32],
) -> Result<(), String> {
    check_count("NORMAL", normals.len(), count)?;
    check_count("TEXCOORD_0", uvs.len(), count)?;
    match indices.iter().find(|&&index| index as usize >= count) {
        Some(index) => Err(format!("index {index} out of range for {count} vertices")),
        None => Ok(()),
    }
}

fn check_count(attribute: &str, len: usize, count: usize) -> Result<(), String> {
    if len == count {
        Ok(())
    } else {
        Err(format!("{attribute} has {len} entries for {count} positions"))
    }
}

fn to_rgba8(data: &gltf::image::Data) -> Option<image::RgbaImage> {
    use gltf::image::Format;

    let pixels: Vec<u8> = match data.format {
        Format::R8G8B8A8 => data.pixels.clone(),
        Format::R8G8B8 => data
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        Format::R8G8 => data
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[1], 0, 255])
            .collect(),
        Format::R8 => data.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        other => {
            log::warn!("  Unsupported glTF image format {:?}", other);
            return None;
        }
    };
    image::RgbaImage::from_raw(data.width, data.height, pixels)
}

/// Per-vertex tangents (xyz, handedness w) accumulated from triangle UV
/// gradients, then orthogonalised against the normal. Only vertices with a
/// position, a normal and a UV get a tangent.
pub fn generate_tangents(
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
    indices: &[u32],
) -> Vec<[f32; 4]> {
    let count = positions.len().min(normals.len()).min(uvs.len());
    let mut tangents = vec![Vec3::ZERO; count];
    let mut bitangents = vec![Vec3::ZERO; count];

    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [0, 1, 2].map(|k| triangle[k] as usize);
        if i0 >= count || i1 >= count || i2 >= count {
            continue;
        }

        let p0 = Vec3::from(positions[i0]);
        let edge1 = Vec3::from(positions[i1]) - p0;
        let edge2 = Vec3::from(positions[i2]) - p0;
        let uv0 = Vec2::from(uvs[i0]);
        let duv1 = Vec2::from(uvs[i1]) - uv0;
        let duv2 = Vec2::from(uvs[i2]) - uv0;

        let f = 1.0 / (duv1.x * duv2.y - duv2.x * duv1.y);
        if !f.is_finite() {
            continue;
        }
        let tangent = (edge1 * duv2.y - edge2 * duv1.y) * f;
        let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * f;

        for i in [i0, i1, i2] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
        }
    }

    (0..count)
        .map(|i| {
            let normal = Vec3::from(normals[i]);
            let t = tangents[i];
            let mut tangent = (t - normal * normal.dot(t)).normalize_or_zero();
            if tangent.length_squared() < 1e-4 {
                tangent = normal.any_orthonormal_vector();
            }
            let w = if normal.cross(tangent).dot(bitangents[i]) < 0.0 {
                -1.0
            } else {
                1.0
            };
            [tangent.x, tangent.y, tangent.z, w]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_tangent_follows_u_axis() {
        let positions = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let normals = [[0.0, 0.0, 1.0]; 4];
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let tangents = generate_tangents(&positions, &normals, &uvs, &[0, 1, 2, 2, 3, 0]);

        for t in tangents {
            assert!(Vec3::new(t[0], t[1], t[2]).abs_diff_eq(Vec3::X, 1e-5));
            assert_eq!(t[3], 1.0);
        }
    }

    #[test]
    fn degenerate_uvs_still_yield_unit_tangents() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let normals = [[0.0, 0.0, 1.0]; 3];
        let uvs = [[0.0, 0.0]; 3];
        for t in generate_tangents(&positions, &normals, &uvs, &[0, 1, 2]) {
            let tangent = Vec3::new(t[0], t[1], t[2]);
            assert!((tangent.length() - 1.0).abs() < 1e-5);
            assert!(tangent.dot(Vec3::Z).abs() < 1e-5);
        }
    }

    #[test]
    fn short_attribute_slices_do_not_panic() {
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let tangents = generate_tangents(&positions, &[[0.0, 0.0, 1.0]], &[[0.0, 0.0]], &[0, 1, 2]);
        assert_eq!(tangents.len(), 1);
    }

    #[test]
    fn mismatched_attribute_counts_are_rejected() {
        let normals = [[0.0, 0.0, 1.0]; 3];
        let uvs = [[0.0, 0.0]; 3];
        assert!(check_attributes(3, &normals, &uvs, &[0, 1, 2]).is_ok());

        let err = check_attributes(3, &normals[..1], &uvs, &[0, 1, 2]).unwrap_err();
        assert!(err.contains("NORMAL"), "{err}");
        let err = check_attributes(3, &normals, &uvs[..2], &[0, 1, 2]).unwrap_err();
        assert!(err.contains("TEXCOORD_0"), "{err}");
        let err = check_attributes(3, &normals, &uvs, &[0, 1, 3]).unwrap_err();
        assert!(err.contains("index 3"), "{err}");
    }

    #[test]
    fn missing_model_is_an_import_error() {
        let result = load_model("no/such/model.gltf");
        assert!(matches!(result, Err(ResourceError::ModelImport { .. })));
    }
}
