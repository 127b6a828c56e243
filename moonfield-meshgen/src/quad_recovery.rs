//! Recovers quad topology from a triangle soup by pairing adjacent
//! triangles that share a diagonal edge, each triangle merged at most once.

use std::collections::HashMap;

use crate::collaborators::CsgMesh;
use crate::geometry::{DEFAULT_POSITION_PRECISION, Face, PositionKey, UnorderedPair};

fn edge_key(vertices: &[crate::geometry::Vec3], a: usize, b: usize, precision: f64) -> UnorderedPair {
    UnorderedPair::new(PositionKey::quantize(vertices[a], precision), PositionKey::quantize(vertices[b], precision))
}

/// The third vertex of a triangle, opposite the given shared edge.
fn opposite_vertex(tri: &[usize; 3], edge: (usize, usize)) -> Option<usize> {
    tri.iter().copied().find(|&v| v != edge.0 && v != edge.1)
}

/// Merges pairs of triangles sharing an edge into quads, at the default
/// quantization precision used elsewhere in the pipeline. Triangles with no
/// available partner, or already claimed by an earlier pairing, pass
/// through unmerged.
pub fn recover_quads(mesh: CsgMesh) -> CsgMesh {
    recover_quads_with_precision(mesh, DEFAULT_POSITION_PRECISION)
}

/// Only an edge that was a real quad diagonal at stroke-build time
/// (present in `mesh.shared_quad_edges`) is eligible to pair two triangles
/// back into a quad — an edge two triangles merely happen to share after a
/// boolean combine, with no such diagonal on record, is never a candidate.
pub fn recover_quads_with_precision(mesh: CsgMesh, precision: f64) -> CsgMesh {
    let mut shared_edges: HashMap<UnorderedPair, Vec<usize>> = HashMap::new();

    for (face_idx, face) in mesh.faces.iter().enumerate() {
        let Face::Tri(tri) = face else { continue };
        for i in 0..3 {
            let a = tri[i];
            let b = tri[(i + 1) % 3];
            let key = edge_key(&mesh.vertices, a, b, precision);
            if mesh.shared_quad_edges.contains(&key) {
                shared_edges.entry(key).or_default().push(face_idx);
            }
        }
    }

    let mut claimed = vec![false; mesh.faces.len()];
    let mut faces = Vec::with_capacity(mesh.faces.len());
    let mut face_sources = Vec::with_capacity(mesh.face_sources.len());

    for (face_idx, face) in mesh.faces.iter().enumerate() {
        if claimed[face_idx] {
            continue;
        }
        let Face::Tri(tri) = face else {
            faces.push(face.clone());
            face_sources.push(mesh.face_sources[face_idx].clone());
            continue;
        };

        let mut merged = false;
        'edges: for i in 0..3 {
            let a = tri[i];
            let b = tri[(i + 1) % 3];
            let key = edge_key(&mesh.vertices, a, b, precision);
            let Some(partners) = shared_edges.get(&key) else { continue };
            for &other_idx in partners {
                if other_idx == face_idx || claimed[other_idx] {
                    continue;
                }
                let Face::Tri(other_tri) = &mesh.faces[other_idx] else { continue };
                let Some(c) = opposite_vertex(tri, (a, b)) else { continue };
                let Some(d) = opposite_vertex(other_tri, (a, b)) else { continue };

                faces.push(Face::Quad([c, a, d, b]));
                face_sources.push(mesh.face_sources[face_idx].clone());
                claimed[face_idx] = true;
                claimed[other_idx] = true;
                merged = true;
                break 'edges;
            }
        }

        if !merged {
            faces.push(face.clone());
            face_sources.push(mesh.face_sources[face_idx].clone());
            claimed[face_idx] = true;
        }
    }

    CsgMesh { vertices: mesh.vertices, faces, face_sources, shared_quad_edges: mesh.shared_quad_edges }
}
