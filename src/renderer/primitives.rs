use super::vertex::{qv, v, QuadVertex, Vertex};

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

/// Unit quad in the XY plane centred on the origin, facing +Z.
pub fn unit_quad() -> (Vec<QuadVertex>, Vec<u32>) {
    let verts = vec![
        qv([-0.5, -0.5, 0.0], [0.0, 1.0]),
        qv([0.5, -0.5, 0.0], [1.0, 1.0]),
        qv([0.5, 0.5, 0.0], [1.0, 0.0]),
        qv([-0.5, 0.5, 0.0], [0.0, 0.0]),
    ];
    (verts, QUAD_INDICES.to_vec())
}

/// Quad covering clip space, for the raymarch and blend passes.
pub fn fullscreen_quad() -> (Vec<QuadVertex>, Vec<u32>) {
    let verts = vec![
        qv([-1.0, -1.0, 0.0], [0.0, 0.0]),
        qv([1.0, -1.0, 0.0], [1.0, 0.0]),
        qv([1.0, 1.0, 0.0], [1.0, 1.0]),
        qv([-1.0, 1.0, 0.0], [0.0, 1.0]),
    ];
    (verts, QUAD_INDICES.to_vec())
}

/// Unit quad with normals and tangents, drawable by the mesh shader.
pub fn unit_quad_mesh() -> (Vec<Vertex>, Vec<u32>) {
    let normal = [0.0, 0.0, 1.0];
    let tangent = [1.0, 0.0, 0.0];
    let verts = unit_quad()
        .0
        .into_iter()
        .map(|q| v(q.position, normal, q.uv, tangent))
        .collect();
    (verts, QUAD_INDICES.to_vec())
}

/// Cube from -1 to 1; the skybox shader only reads positions.
pub fn skybox_cube() -> (Vec<QuadVertex>, Vec<u32>) {
    let corners = [
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
    ];
    let verts = corners.iter().map(|&c| qv(c, [0.0, 0.0])).collect();
    let indices = vec![
        0, 1, 2, 2, 3, 0, // -Z
        4, 7, 6, 6, 5, 4, // +Z
        0, 3, 7, 7, 4, 0, // -X
        1, 5, 6, 6, 2, 1, // +X
        3, 2, 6, 6, 7, 3, // +Y
        0, 4, 5, 5, 1, 0, // -Y
    ];
    (verts, indices)
}

/// Axis-aligned unit cube with per-face normals and tangents.
pub fn cube_mesh() -> (Vec<Vertex>, Vec<u32>) {
    // (normal, tangent) per face; the bitangent follows from their cross product.
    const FACES: [([f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0]),
    ];
    const CORNERS: [([f32; 2], [f32; 2]); 4] = [
        ([-0.5, -0.5], [0.0, 1.0]),
        ([0.5, -0.5], [1.0, 1.0]),
        ([0.5, 0.5], [1.0, 0.0]),
        ([-0.5, 0.5], [0.0, 0.0]),
    ];

    let mut verts = Vec::with_capacity(24);
    for (normal, tangent) in FACES {
        let n = glam::Vec3::from(normal);
        let t = glam::Vec3::from(tangent);
        let b = n.cross(t);
        for ([s, u], uv) in CORNERS {
            let p = n * 0.5 + t * s + b * u;
            verts.push(v(p.to_array(), normal, uv, tangent));
        }
    }

    let idx = (0..6u32)
        .flat_map(|f| QUAD_INDICES.map(|i| f * 4 + i))
        .collect::<Vec<_>>();

    (verts, idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_counts_look_right() {
        let (v, i) = cube_mesh();
        assert_eq!(v.len(), 24);
        assert_eq!(i.len(), 36);
    }

    #[test]
    fn cube_faces_sit_on_their_normals() {
        let (verts, _) = cube_mesh();
        for vert in verts {
            let p = glam::Vec3::from(vert.position);
            let n = glam::Vec3::from(vert.normal);
            assert!((p.dot(n) - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn skybox_indices_stay_in_range() {
        let (verts, indices) = skybox_cube();
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < verts.len()));
    }
}
