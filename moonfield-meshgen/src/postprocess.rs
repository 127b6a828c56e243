//! Post-combination cleanup: weld-until-stable, face normal and color
//! derivation, triangle source-node resolution, and smooth vertex normals.

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::collaborators::{CsgMesh, SourceNode, resolve_triangle_source_node, smooth_normal, weld_vertices};
use crate::geometry::{Face, PositionKey, Vec3};

/// Repeatedly welds a mesh until a pass removes no further vertices.
/// `none_seam_vertex_indices` names vertices that must never be welded away
/// (seam vertices explicitly marked to stay distinct); they are masked out
/// by quantizing them to unique keys that cannot collide with anything
/// else before each pass, then restored to their original positions after.
#[instrument(skip(mesh, none_seam_vertex_indices))]
pub fn weld_until_stable(mesh: CsgMesh, threshold: f64, none_seam_vertex_indices: &[usize]) -> CsgMesh {
    if none_seam_vertex_indices.is_empty() {
        let mut current = mesh;
        loop {
            let (welded, removed) = weld_vertices(&current, threshold);
            current = welded;
            if removed == 0 {
                return current;
            }
        }
    }

    // Shift protected vertices far outside the model's extent so no other
    // vertex can quantize to the same key, weld, then they are restored by
    // position since welding never removes a vertex with a unique key.
    let mut shifted = mesh.clone();
    let guard_offset = Vec3::new(1.0e6, 1.0e6, 1.0e6);
    for (i, idx) in none_seam_vertex_indices.iter().enumerate() {
        if let Some(v) = shifted.vertices.get_mut(*idx) {
            *v += guard_offset * (i as f64 + 1.0);
        }
    }

    let mut current = shifted;
    loop {
        let (welded, removed) = weld_vertices(&current, threshold);
        current = welded;
        if removed == 0 {
            break;
        }
    }

    for (i, idx) in none_seam_vertex_indices.iter().enumerate() {
        if let Some(v) = current.vertices.get_mut(*idx) {
            *v -= guard_offset * (i as f64 + 1.0);
        }
    }

    current
}

fn face_normal(vertices: &[Vec3], face: &Face) -> Vec3 {
    let idx = face.indices();
    let a = vertices[idx[0]];
    let b = vertices[idx[1]];
    let c = vertices[idx[2]];
    let normal = (b - a).cross(&(c - a));
    if normal.norm() < f64::EPSILON { normal } else { normal.normalize() }
}

/// Default color for a triangle whose source part carries none of its own.
const DEFAULT_COLOR: &str = "white";

/// Computes one face normal per face, resolves each face's source node
/// (logging when it was lost during combination), and tags each face with
/// the color carried from its source part, defaulting to white when the
/// part has no color of its own or the source could not be resolved.
pub fn derive_face_attributes(mesh: &CsgMesh, part_colors: &HashMap<String, String>) -> (Vec<Vec3>, Vec<Option<SourceNode>>, Vec<String>) {
    let mut normals = Vec::with_capacity(mesh.faces.len());
    let mut resolved_sources = Vec::with_capacity(mesh.faces.len());
    let mut colors = Vec::with_capacity(mesh.faces.len());

    for (face, source) in mesh.faces.iter().zip(mesh.face_sources.iter()) {
        normals.push(face_normal(&mesh.vertices, face));
        let resolved = resolve_triangle_source_node(source);
        let color = resolved.as_ref().and_then(|s| part_colors.get(&s.part_id).cloned()).unwrap_or_else(|| DEFAULT_COLOR.to_string());
        colors.push(color);
        resolved_sources.push(resolved);
    }

    (normals, resolved_sources, colors)
}

/// Resolves one source node per output vertex: the source of the first face
/// (in mesh order) touching that vertex index, or `None` if no face touches
/// it. Mirrors [`triangle_vertex_normals`]'s incidence-accumulation shape but
/// keeps only the first hit, since a source label (unlike a normal) is not
/// meaningfully averaged across faces.
pub fn vertex_source_nodes(mesh: &CsgMesh) -> Vec<Option<SourceNode>> {
    let mut sources: Vec<Option<SourceNode>> = vec![None; mesh.vertices.len()];
    for (face, source) in mesh.faces.iter().zip(mesh.face_sources.iter()) {
        for &vertex_idx in face.indices() {
            if sources[vertex_idx].is_none() {
                sources[vertex_idx] = source.clone();
            }
        }
    }
    sources
}

/// Computes one smoothed normal per triangle corner by averaging the
/// normals of every face incident to that corner's vertex, excluding faces
/// across a crease sharper than `crease_threshold_degrees`. Unlike a single
/// per-vertex normal, this lets a vertex sitting on a hard crease present a
/// different normal to each of its incident triangles. `mesh` must already
/// be fully triangulated — a `Face::Quad` has no well-defined 3-corner
/// normal array and is skipped.
pub fn triangle_vertex_normals(mesh: &CsgMesh, face_normals: &[Vec3], crease_threshold_degrees: f64) -> Vec<[Vec3; 3]> {
    let mut incident: HashMap<usize, Vec<Vec3>> = HashMap::new();
    for (face, normal) in mesh.faces.iter().zip(face_normals.iter()) {
        for &vertex_idx in face.indices() {
            incident.entry(vertex_idx).or_default().push(*normal);
        }
    }

    mesh.faces
        .iter()
        .zip(face_normals.iter())
        .filter_map(|(face, reference)| match face {
            Face::Tri(idx) => Some(idx.map(|vertex_idx| {
                let normals = incident.get(&vertex_idx).map(Vec::as_slice).unwrap_or(&[]);
                smooth_normal(*reference, normals, crease_threshold_degrees)
            })),
            Face::Quad(_) => None,
        })
        .collect()
}

/// Maps a set of protected positions (a component's pre-CSG vertex
/// positions, quantized) onto the indices of `mesh` that currently sit at
/// one of those positions — the `none_seam_vertex_indices` argument
/// `weld_until_stable` needs to keep a component's interior seam intact.
pub fn none_seam_indices(mesh: &CsgMesh, positions: &HashSet<PositionKey>, precision: f64) -> Vec<usize> {
    mesh.vertices
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| positions.contains(&PositionKey::quantize(*v, precision)).then_some(idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> CsgMesh {
        CsgMesh {
            vertices: vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
            faces: vec![Face::Tri([0, 1, 2]), Face::Tri([0, 2, 3])],
            face_sources: vec![None, None],
            shared_quad_edges: HashSet::new(),
        }
    }

    #[test]
    fn weld_until_stable_converges_on_duplicate_points() {
        let mesh = CsgMesh {
            vertices: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1e-7, 0.0, 0.0),
                Vec3::new(1e-8, 1e-8, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            faces: vec![Face::Tri([0, 3, 4]), Face::Tri([1, 3, 4]), Face::Tri([2, 3, 4])],
            face_sources: vec![None, None, None],
            shared_quad_edges: HashSet::new(),
        };
        let welded = weld_until_stable(mesh, 1e-4, &[]);
        assert_eq!(welded.vertices.len(), 3);
    }

    #[test]
    fn weld_until_stable_keeps_protected_vertices_distinct() {
        let mesh = CsgMesh {
            vertices: vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1e-7, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)],
            faces: vec![Face::Tri([0, 1, 2])],
            face_sources: vec![None],
            shared_quad_edges: HashSet::new(),
        };
        let welded = weld_until_stable(mesh, 1e-4, &[0, 1]);
        assert_eq!(welded.vertices.len(), 3);
    }

    #[test]
    fn face_normal_points_along_z_for_flat_xy_quad() {
        let mesh = quad_mesh();
        let normal = face_normal(&mesh.vertices, &mesh.faces[0]);
        assert!((normal.z.abs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn triangle_vertex_normals_agree_on_flat_surface() {
        let mesh = quad_mesh();
        let normals: Vec<Vec3> = mesh.faces.iter().map(|f| face_normal(&mesh.vertices, f)).collect();
        let corners = triangle_vertex_normals(&mesh, &normals, 60.0);
        assert_eq!(corners.len(), mesh.faces.len());
        for triangle in &corners {
            for n in triangle {
                assert!((n.z.abs() - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn triangle_vertex_normals_diverge_across_a_hard_crease() {
        // Two triangles sharing edge (1,2) but folded 90 degrees apart: the
        // shared vertices must show each triangle's own face normal, not an
        // average, once the crease exceeds the threshold.
        let mesh = CsgMesh {
            vertices: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 1.0),
            ],
            faces: vec![Face::Tri([0, 1, 2]), Face::Tri([1, 3, 2])],
            face_sources: vec![None, None],
            shared_quad_edges: HashSet::new(),
        };
        let normals: Vec<Vec3> = mesh.faces.iter().map(|f| face_normal(&mesh.vertices, f)).collect();
        let corners = triangle_vertex_normals(&mesh, &normals, 10.0);
        // Vertex 1's normal as seen from triangle 0 should match triangle 0's
        // own face normal exactly, since the crease excludes triangle 1.
        assert_eq!(corners[0][1], normals[0]);
    }

    #[test]
    fn none_seam_indices_finds_matching_positions() {
        let mesh = quad_mesh();
        let mut positions = HashSet::new();
        positions.insert(PositionKey::quantize(mesh.vertices[0], 1e-4));
        let indices = none_seam_indices(&mesh, &positions, 1e-4);
        assert_eq!(indices, vec![0]);
    }

    #[test]
    fn derive_face_attributes_resolves_color_from_source_part() {
        let mut mesh = quad_mesh();
        mesh.face_sources = vec![Some(SourceNode { part_id: "p1".into(), node_id: "n1".into() }), None];
        let mut part_colors = HashMap::new();
        part_colors.insert("p1".to_string(), "red".to_string());

        let (_, _, colors) = derive_face_attributes(&mesh, &part_colors);
        assert_eq!(colors[0], "red");
        assert_eq!(colors[1], "white");
    }

    #[test]
    fn vertex_source_nodes_resolves_first_touching_face() {
        let mut mesh = quad_mesh();
        mesh.face_sources = vec![Some(SourceNode { part_id: "p1".into(), node_id: "n1".into() }), None];
        let sources = vertex_source_nodes(&mesh);
        // Vertex 0 is touched by face 0 first.
        assert_eq!(sources[0].as_ref().map(|s| s.part_id.as_str()), Some("p1"));
        // Vertex 3 is touched only by face 1, which has no source.
        assert_eq!(sources[3], None);
    }
}
