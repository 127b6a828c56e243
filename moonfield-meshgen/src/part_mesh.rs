//! Builds the 3D mesh for a single part: skeleton assembly from its node
//! chain, cross-section sweep, subdivide/round modifiers, the
//! intermediate-node retry policy, mirror reflection, and the cached
//! preview mesh.

use std::collections::{HashMap, HashSet};

use tracing::{instrument, warn};

use crate::attrs::AttrReader;
use crate::collaborators::{CsgMesh, DefaultStrokeMeshBuilder, DeformParams, SkeletonNode, StrokeMeshBuilder, trim_vertices};
use crate::config::GenerationConfig;
use crate::cutface::resolve_cut_template;
use crate::geometry::{self, Face, Vec3};
use crate::snapshot::{BaseAxis, Part, Snapshot, SnapshotIndex};

/// A part's cached build result: its mesh (contributed to CSG when the part
/// is joined), a rescaled preview kept regardless of whether the part
/// joined, whether the build actually produced usable geometry, and the
/// presentational graph data (node/edge ids and resolved node positions)
/// bubbled up into the final `Object`.
#[derive(Debug, Clone, Default)]
pub struct PartCacheEntry {
    pub mesh: CsgMesh,
    pub preview: CsgMesh,
    pub is_successful: bool,
    pub object_nodes: HashSet<String>,
    pub object_edges: HashSet<String>,
    pub object_node_vertices: HashMap<String, Vec3>,
}

fn base_normal(axis: BaseAxis) -> Vec3 {
    match axis {
        BaseAxis::YZ => Vec3::new(1.0, 0.0, 0.0),
        BaseAxis::XY => Vec3::new(0.0, 0.0, 1.0),
        BaseAxis::ZX => Vec3::new(0.0, 1.0, 0.0),
        BaseAxis::Average => Vec3::new(1.0, 1.0, 1.0).normalize(),
    }
}

/// One linear subdivision pass: inserts the midpoint (position and radius
/// averaged) between every consecutive pair of skeleton nodes. The inserted
/// node inherits its left neighbor's id for source-node attribution
/// purposes, since it has no node of its own in the snapshot.
fn subdivide_skeleton(skeleton: &[SkeletonNode]) -> Vec<SkeletonNode> {
    if skeleton.len() < 2 {
        return skeleton.to_vec();
    }
    let mut out = Vec::with_capacity(skeleton.len() * 2 - 1);
    for window in skeleton.windows(2) {
        let (n0, n1) = (&window[0], &window[1]);
        out.push(n0.clone());
        out.push(SkeletonNode {
            center: (n0.center + n1.center) * 0.5,
            radius: (n0.radius + n1.radius) * 0.5,
            node_id: n0.node_id.clone(),
            cut_rotation: n0.cut_rotation,
        });
    }
    out.push(skeleton.last().unwrap().clone());
    out
}

/// One Chaikin corner-cutting pass over the skeleton polyline, pulling
/// interior nodes toward the segment midpoints to approximate a rounded
/// joint. Inserted corner-cut points inherit the id of the original node
/// they were cut from.
fn round_skeleton(skeleton: &[SkeletonNode]) -> Vec<SkeletonNode> {
    if skeleton.len() < 3 {
        return skeleton.to_vec();
    }
    let mut out = Vec::with_capacity(skeleton.len());
    out.push(skeleton[0].clone());
    for window in skeleton.windows(3) {
        let (n0, n1, n2) = (&window[0], &window[1], &window[2]);
        let a = (n0.center + n1.center) * 0.5;
        let b = (n1.center + n2.center) * 0.5;
        out.push(SkeletonNode { center: a, radius: (n0.radius + n1.radius) * 0.5, node_id: n1.node_id.clone(), cut_rotation: n1.cut_rotation });
        out.push(n1.clone());
        out.push(SkeletonNode { center: b, radius: (n1.radius + n2.radius) * 0.5, node_id: n1.node_id.clone(), cut_rotation: n1.cut_rotation });
    }
    out.push(skeleton.last().unwrap().clone());
    out
}

/// Orders a part's nodes into a skeleton chain by walking its edge graph,
/// reusing the same walk used for cut-face extraction so both agree on
/// node ordering for a given part topology.
fn order_skeleton(part: &Part, snapshot: &Snapshot, index: &SnapshotIndex) -> Vec<SkeletonNode> {
    let mut node_ids = index.nodes_of(&part.id);
    node_ids.sort();

    let mut adjacency: std::collections::HashMap<String, Vec<String>> = std::collections::HashMap::new();
    for id in &node_ids {
        adjacency.entry(id.clone()).or_default();
    }
    for edge_id in index.edges_of(&part.id) {
        let Some(edge) = snapshot.edges.get(&edge_id) else { continue };
        let (Some(from), Some(to)) = (edge.from(), edge.to()) else { continue };
        adjacency.entry(from.to_string()).or_default().push(to.to_string());
        adjacency.entry(to.to_string()).or_default().push(from.to_string());
    }

    let start = node_ids
        .iter()
        .find(|id| adjacency.get(*id).map(|n| n.len()).unwrap_or(0) == 1)
        .or_else(|| node_ids.first())
        .cloned();

    let Some(start) = start else { return Vec::new() };

    let mut visited = std::collections::HashSet::new();
    let mut order = Vec::new();
    let mut current = start;
    loop {
        visited.insert(current.clone());
        order.push(current.clone());
        let next = adjacency.get(&current).and_then(|neighbors| neighbors.iter().find(|n| !visited.contains(*n)).cloned());
        match next {
            Some(n) => current = n,
            None => break,
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let node = snapshot.nodes.get(&id)?;
            let cut_rotation = node.cut_rotation().unwrap_or_else(|| part.cut_rotation());
            Some(SkeletonNode { center: node.position(&snapshot.canvas), radius: node.radius(), node_id: id, cut_rotation })
        })
        .collect()
}

fn mirror_mesh(mesh: CsgMesh, precision: f64) -> CsgMesh {
    let vertices: Vec<Vec3> = mesh.vertices.iter().map(|v| Vec3::new(-v.x, v.y, v.z)).collect();
    let faces: Vec<Face> = mesh.faces.iter().map(geometry::reverse_face).collect();
    // Reflection moves every vertex, so a diagonal recorded pre-mirror no
    // longer keys to the same quantized position; recompute from scratch
    // rather than carry the stale set through.
    let shared_quad_edges = geometry::quad_diagonals(&vertices, &faces, precision);
    CsgMesh { vertices, faces, face_sources: mesh.face_sources, shared_quad_edges }
}

fn mirror_position(position: Vec3, mirrored: bool) -> Vec3 {
    if mirrored { Vec3::new(-position.x, position.y, position.z) } else { position }
}

/// Builds a part's mesh, applying its modifiers in order: subdivide, round,
/// stroke sweep, then mirror reflection if this part is a mirrored twin. If
/// the initial skeleton is too short to sweep (fewer than 2 nodes and not a
/// single-node sphere) and the part allows it, retries once with a
/// synthetic midpoint node inserted between the first two available
/// positions.
#[instrument(skip(snapshot, index, config), fields(part_id = %part.id))]
pub fn build_part_mesh(part: &Part, snapshot: &Snapshot, index: &SnapshotIndex, config: &GenerationConfig) -> PartCacheEntry {
    let mirrored = part.mirror_from_part_id().is_some();
    let object_nodes: HashSet<String> = index.nodes_of(&part.id).into_iter().collect();
    let object_edges: HashSet<String> = index.edges_of(&part.id).into_iter().collect();
    let object_node_vertices: HashMap<String, Vec3> = object_nodes
        .iter()
        .filter_map(|id| snapshot.nodes.get(id).map(|node| (id.clone(), mirror_position(node.position(&snapshot.canvas), mirrored))))
        .collect();

    let mut skeleton = order_skeleton(part, snapshot, index);

    if skeleton.is_empty() {
        warn!(part_id = %part.id, "part has no nodes to build a mesh from");
        return PartCacheEntry {
            mesh: CsgMesh::default(),
            preview: CsgMesh::default(),
            is_successful: false,
            object_nodes,
            object_edges,
            object_node_vertices,
        };
    }

    // `smooth` enables an extra subdivision pass ahead of the user-requested
    // subdivide/round modifiers, independent of them.
    if part.smooth() {
        skeleton = subdivide_skeleton(&skeleton);
    }
    if part.subdived() {
        skeleton = subdivide_skeleton(&skeleton);
    }
    if part.rounded() {
        skeleton = round_skeleton(&skeleton);
    }

    let cut_face = part.cut_face().unwrap_or("Ring");
    let cross_section = resolve_cut_template(cut_face, part.chamfered(), snapshot, index);

    let deform =
        DeformParams { width: part.deform_width(), thickness: part.deform_thickness(), unified: part.deform_unified(), hollow_thickness: part.hollow_thickness() };

    let builder = DefaultStrokeMeshBuilder { base_normal: base_normal(part.base()), position_precision: config.position_key_precision };
    let mut mesh = builder.build(&part.id, &skeleton, &cross_section, false, &deform);

    if mesh.faces.is_empty() && part.is_retry_eligible() && skeleton.len() >= 2 {
        warn!(part_id = %part.id, "initial stroke build was empty, retrying with a synthetic midpoint node");
        let retried = subdivide_skeleton(&skeleton);
        mesh = builder.build(&part.id, &retried, &cross_section, false, &deform);
    }

    let is_successful = !mesh.faces.is_empty();
    if !is_successful {
        warn!(part_id = %part.id, "part build produced no faces");
    }

    if mirrored {
        mesh = mirror_mesh(mesh, config.position_key_precision);
    }

    let preview = trim_vertices(&mesh, config.preview_rescale);
    PartCacheEntry { mesh, preview, is_successful, object_nodes, object_edges, object_node_vertices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttrMap;
    use crate::snapshot::{Canvas, Node};
    use std::collections::HashSet;

    fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn single_node_snapshot() -> (Snapshot, SnapshotIndex, Part) {
        let mut snapshot = Snapshot { canvas: Canvas::default(), ..Default::default() };
        let part = Part::new("p1", attrs(&[]));
        snapshot.parts.insert(part.id.clone(), part.clone());
        snapshot.nodes.insert("n0".into(), Node::new("n0", attrs(&[("x", "0"), ("y", "0"), ("z", "0"), ("radius", "1"), ("partId", "p1")])));
        let index = SnapshotIndex::build(&snapshot);
        (snapshot, index, part)
    }

    #[test]
    fn single_node_part_builds_a_sphere() {
        let (snapshot, index, part) = single_node_snapshot();
        let entry = build_part_mesh(&part, &snapshot, &index, &GenerationConfig::default());
        assert!(!entry.mesh.faces.is_empty());
        assert!(entry.mesh.face_sources.iter().all(|s| s.as_ref().is_some_and(|s| s.part_id == "p1" && s.node_id == "n0")));
        assert!(entry.is_successful);
        assert!(entry.object_nodes.contains("n0"));
        assert_eq!(entry.object_node_vertices.get("n0"), Some(&Vec3::new(0.0, 0.0, 0.0)));
    }

    #[test]
    fn subdivide_skeleton_doubles_segment_count() {
        let skeleton = vec![SkeletonNode::new(Vec3::new(0.0, 0.0, 0.0), 1.0, "n0"), SkeletonNode::new(Vec3::new(2.0, 0.0, 0.0), 1.0, "n1")];
        let subdivided = subdivide_skeleton(&skeleton);
        assert_eq!(subdivided.len(), 3);
        assert_eq!(subdivided[1].center, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn deform_thickness_and_hollow_are_threaded_into_the_build() {
        let mut snapshot = Snapshot { canvas: Canvas::default(), ..Default::default() };
        let part = Part::new("p1", attrs(&[("deformWidth", "2"), ("deformThickness", "0.5"), ("hollowThickness", "0.1")]));
        snapshot.parts.insert(part.id.clone(), part.clone());
        snapshot.nodes.insert("n0".into(), Node::new("n0", attrs(&[("x", "0"), ("y", "0"), ("z", "0"), ("radius", "1"), ("partId", "p1")])));
        snapshot.nodes.insert("n1".into(), Node::new("n1", attrs(&[("x", "0"), ("y", "0"), ("z", "5"), ("radius", "1"), ("partId", "p1")])));
        snapshot.edges.insert("e0".into(), crate::snapshot::Edge::new("e0", attrs(&[("from", "n0"), ("to", "n1"), ("partId", "p1")])));
        let index = SnapshotIndex::build(&snapshot);

        let hollow_entry = build_part_mesh(&part, &snapshot, &index, &GenerationConfig::default());

        let solid_part = Part::new("p1", attrs(&[]));
        let solid_entry = build_part_mesh(&solid_part, &snapshot, &index, &GenerationConfig::default());

        assert_ne!(hollow_entry.mesh.faces.len(), solid_entry.mesh.faces.len());
    }

    #[test]
    fn mirror_mesh_negates_x_and_reverses_winding() {
        let mesh = CsgMesh {
            vertices: vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
            faces: vec![Face::Tri([0, 1, 2])],
            face_sources: vec![None],
            shared_quad_edges: HashSet::new(),
        };
        let mirrored = mirror_mesh(mesh, 1e-4);
        assert_eq!(mirrored.vertices[0].x, -1.0);
        assert!(matches!(mirrored.faces[0], Face::Tri([0, 2, 1])));
    }

    #[test]
    fn empty_part_with_no_nodes_returns_empty_mesh() {
        let snapshot = Snapshot::default();
        let index = SnapshotIndex::default();
        let part = Part::new("lonely", attrs(&[]));
        let entry = build_part_mesh(&part, &snapshot, &index, &GenerationConfig::default());
        assert!(entry.mesh.faces.is_empty());
    }
}
