//! Top-level pipeline orchestration: validates the snapshot, preprocesses
//! mirrors, computes the dirty closure, rebuilds only what changed, and
//! combines the component tree into the final output object.

use std::collections::HashSet;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::cache::{ComponentCacheEntry, GeneratedCacheContext};
use crate::collaborators::{
    CombineInput, CsgMesh, DefaultRecombiner, MeshCombiner, MeshRecombiner, NaiveMeshCombiner, SourceNode, concat_meshes, triangulate,
};
use crate::combine::combine_multiple_meshes;
use crate::config::GenerationConfig;
use crate::dirty::compute_dirty_sets;
use crate::error::MeshGenError;
use crate::geometry::{Face, PositionKey, Vec3};
use crate::mirror::preprocess_mirrors;
use crate::part_mesh::build_part_mesh;
use crate::postprocess::{derive_face_attributes, none_seam_indices, triangle_vertex_normals, vertex_source_nodes, weld_until_stable};
use crate::snapshot::{Snapshot, SnapshotIndex};

/// A resolved graph node surfaced on the final object: an id paired with
/// its (mirror-adjusted) world position.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectNode {
    pub id: String,
    pub position: Vec3,
}

/// A resolved graph edge surfaced on the final object: an id paired with
/// the endpoints it connects.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEdge {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// The fully post-processed mesh handed back to the caller. `faces` is the
/// quad-recovered geometry (`triangleAndQuads`); `triangles` is the same
/// welded vertex buffer re-triangulated, with one normal per triangle
/// *corner* rather than per shared vertex, so a vertex straddling a hard
/// crease can present a different normal to each adjacent triangle.
#[derive(Debug, Clone, Default)]
pub struct Object {
    pub mesh_id: Uuid,
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Face>,
    pub triangles: Vec<[usize; 3]>,
    pub triangle_normals: Vec<Vec3>,
    pub triangle_vertex_normals: Vec<[Vec3; 3]>,
    pub triangle_colors: Vec<String>,
    pub triangle_sources: Vec<Option<SourceNode>>,
    pub vertex_sources: Vec<Option<SourceNode>>,
    pub nodes: Vec<ObjectNode>,
    pub edges: Vec<ObjectEdge>,
    pub is_successful: bool,
    pub preview: Option<CsgMesh>,
}

pub struct Generator {
    pub config: GenerationConfig,
    pub cache: GeneratedCacheContext,
    combiner: Box<dyn MeshCombiner>,
    recombiner: Box<dyn MeshRecombiner>,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            config: GenerationConfig::default(),
            cache: GeneratedCacheContext::default(),
            combiner: Box::new(NaiveMeshCombiner),
            recombiner: Box::new(DefaultRecombiner),
        }
    }
}

impl Generator {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config, ..Self::default() }
    }

    fn part_colors(&self, snapshot: &Snapshot) -> std::collections::HashMap<String, String> {
        snapshot
            .parts
            .values()
            .filter_map(|p| p.color().map(|c| (p.id.clone(), c.to_string())))
            .collect()
    }

    /// Builds (or fetches from cache) a component's contribution to the
    /// tree. A leaf is the part's own mesh, with its entire vertex set
    /// recorded as `noneSeamVertices` (nothing in this subtree has gone
    /// through CSG yet). A non-leaf recurses into its children, bubbles up
    /// every descendant's uncombined/incombinable submeshes and seam
    /// positions regardless of depth, and folds in whatever this level's own
    /// combine step routed around the CSG accumulator.
    fn build_component_mesh(&mut self, component_id: &str, snapshot: &Snapshot, index: &SnapshotIndex) -> ComponentCacheEntry {
        if let Some(cached) = self.cache.component_cache.get(component_id) {
            return cached.clone();
        }

        let entry = match snapshot.components.get(component_id) {
            None => ComponentCacheEntry { is_successful: true, ..ComponentCacheEntry::default() },
            Some(component) if component.is_leaf() => self.build_leaf_component(component_id, snapshot, index),
            Some(component) => {
                let children: Vec<String> = component.children.clone();
                let mut uncombined = Vec::new();
                let mut incombinable = Vec::new();
                let mut none_seam_positions = HashSet::new();
                let mut object_nodes = HashSet::new();
                let mut object_edges = HashSet::new();
                let mut object_node_vertices = std::collections::HashMap::new();
                let mut previews = Vec::new();
                let mut children_successful = true;

                let inputs: Vec<CombineInput> = children
                    .iter()
                    .filter_map(|child_id| {
                        let mode = snapshot.components.get(child_id)?.combine_mode();
                        let child_entry = self.build_component_mesh(child_id, snapshot, index);
                        uncombined.extend(child_entry.uncombined);
                        incombinable.extend(child_entry.incombinable);
                        none_seam_positions.extend(child_entry.none_seam_positions);
                        object_nodes.extend(child_entry.object_nodes);
                        object_edges.extend(child_entry.object_edges);
                        object_node_vertices.extend(child_entry.object_node_vertices);
                        previews.extend(child_entry.previews);
                        children_successful &= child_entry.is_successful;
                        Some(CombineInput { component_id: child_id.clone(), mode, mesh: child_entry.mesh })
                    })
                    .collect();

                let outcome = combine_multiple_meshes(self.combiner.as_ref(), self.recombiner.as_ref(), &mut self.cache.combination_cache, &inputs);
                uncombined.extend(outcome.uncombined);
                incombinable.extend(outcome.incombinable);
                ComponentCacheEntry {
                    mesh: outcome.mesh,
                    uncombined,
                    incombinable,
                    none_seam_positions,
                    is_successful: children_successful && outcome.is_successful,
                    object_nodes,
                    object_edges,
                    object_node_vertices,
                    previews,
                }
            }
        };

        self.cache.component_cache.insert(component_id.to_string(), entry.clone());
        entry
    }

    /// Builds (or fetches) the single part a leaf component links to. The
    /// part's own mesh is always built and its preview always kept — a
    /// component whose part is marked `joined = false` still contributes a
    /// preview and presentational graph data, it just withholds `mesh` from
    /// the CSG accumulator.
    fn build_leaf_component(&mut self, component_id: &str, snapshot: &Snapshot, index: &SnapshotIndex) -> ComponentCacheEntry {
        let successful_default = ComponentCacheEntry { is_successful: true, ..ComponentCacheEntry::default() };
        let Some(component) = snapshot.components.get(component_id) else { return successful_default };
        let Some(part_id) = component.link_data() else { return successful_default };
        let Some(part) = snapshot.parts.get(part_id) else { return successful_default };

        let part_entry =
            self.cache.part_cache.entry(part.id.clone()).or_insert_with(|| build_part_mesh(part, snapshot, index, &self.config)).clone();
        let none_seam_positions =
            part_entry.mesh.vertices.iter().map(|v| PositionKey::quantize(*v, self.config.position_key_precision)).collect();

        ComponentCacheEntry {
            mesh: part.joined().then(|| part_entry.mesh),
            uncombined: Vec::new(),
            incombinable: Vec::new(),
            none_seam_positions,
            is_successful: part_entry.is_successful,
            object_nodes: part_entry.object_nodes,
            object_edges: part_entry.object_edges,
            object_node_vertices: part_entry.object_node_vertices,
            previews: vec![part_entry.preview],
        }
    }

    fn clear_dirty_flags(snapshot: &mut Snapshot) {
        for part in snapshot.parts.values_mut() {
            part.attrs.insert("__dirty".to_string(), "false".to_string());
        }
        for component in snapshot.components.values_mut() {
            component.attrs.insert("__dirty".to_string(), "false".to_string());
        }
    }

    /// Runs the full pipeline and returns the combined, welded, attributed
    /// object. Mutates `snapshot` in place: mirror twins are synthesized,
    /// and every part/component's dirty flag is cleared once its
    /// contribution has been rebuilt.
    #[instrument(skip(self, snapshot))]
    pub fn generate(&mut self, snapshot: &mut Snapshot) -> Result<Object, MeshGenError> {
        snapshot.validate()?;
        preprocess_mirrors(snapshot);

        let index = SnapshotIndex::build(snapshot);
        let dirty = compute_dirty_sets(snapshot);
        self.cache.invalidate(&dirty);

        let root_entry = self.build_component_mesh(&snapshot.root_component, snapshot, &index);

        let mut pieces = vec![root_entry.mesh.unwrap_or_default()];
        pieces.extend(root_entry.uncombined);
        pieces.extend(root_entry.incombinable);
        let combined = concat_meshes(pieces);

        let triangulated = triangulate(combined);
        let recombined = self.recombiner.recombine(triangulated);

        // Every vertex position that existed in any leaf part before CSG
        // ever ran on it must survive this final weld untouched.
        let none_seam_idx = none_seam_indices(&recombined, &root_entry.none_seam_positions, self.config.position_key_precision);
        let welded = weld_until_stable(recombined, self.config.weld_threshold, &none_seam_idx);

        let triangulated_for_attrs = triangulate(welded.clone());
        let part_colors = self.part_colors(snapshot);
        let (triangle_normals, triangle_sources, triangle_colors) = derive_face_attributes(&triangulated_for_attrs, &part_colors);
        let vertex_normals_per_triangle =
            triangle_vertex_normals(&triangulated_for_attrs, &triangle_normals, self.config.smooth_shading_threshold_angle_degrees);
        let vertex_sources = vertex_source_nodes(&welded);
        let triangles: Vec<[usize; 3]> = triangulated_for_attrs
            .faces
            .iter()
            .map(|f| match f {
                Face::Tri(idx) => *idx,
                Face::Quad(_) => unreachable!("triangulate never emits quads"),
            })
            .collect();

        let nodes: Vec<ObjectNode> = root_entry
            .object_nodes
            .iter()
            .filter_map(|id| root_entry.object_node_vertices.get(id).map(|position| ObjectNode { id: id.clone(), position: *position }))
            .collect();
        let edges: Vec<ObjectEdge> = root_entry
            .object_edges
            .iter()
            .filter_map(|id| snapshot.edges.get(id))
            .filter_map(|edge| Some(ObjectEdge { id: edge.id.clone(), from: edge.from()?.to_string(), to: edge.to()?.to_string() }))
            .collect();
        let preview = concat_meshes(root_entry.previews.clone());
        let preview = (!preview.vertices.is_empty()).then_some(preview);

        let live_part_ids: HashSet<String> = snapshot.parts.keys().cloned().collect();
        let live_component_ids: HashSet<String> = snapshot.components.keys().cloned().collect();
        self.cache.free_vanished(&live_part_ids, &live_component_ids);

        Self::clear_dirty_flags(snapshot);

        info!(vertex_count = welded.vertices.len(), face_count = welded.faces.len(), "generation complete");

        Ok(Object {
            mesh_id: Uuid::new_v4(),
            vertices: welded.vertices,
            faces: welded.faces,
            triangles,
            triangle_normals,
            triangle_vertex_normals: vertex_normals_per_triangle,
            triangle_colors,
            triangle_sources,
            vertex_sources,
            nodes,
            edges,
            is_successful: root_entry.is_successful,
            preview,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttrMap;
    use crate::snapshot::{Canvas, Component, Node, Part};

    fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn single_sphere_snapshot() -> Snapshot {
        let mut snapshot = Snapshot { canvas: Canvas::default(), ..Default::default() };
        snapshot.root_component = "root".into();
        snapshot.parts.insert("p1".into(), Part::new("p1", attrs(&[])));
        snapshot
            .nodes
            .insert("n0".into(), Node::new("n0", attrs(&[("x", "0"), ("y", "0"), ("z", "0"), ("radius", "1"), ("partId", "p1")])));
        snapshot.components.insert("root".into(), Component::new("root", attrs(&[("children", "leaf")])));
        snapshot.components.insert("leaf".into(), Component::new("leaf", attrs(&[("linkDataType", "partId"), ("linkData", "p1")])));
        snapshot
    }

    #[test]
    fn generate_produces_a_non_empty_object_for_a_single_sphere() {
        let mut snapshot = single_sphere_snapshot();
        let mut generator = Generator::default();
        let object = generator.generate(&mut snapshot).unwrap();
        assert!(!object.vertices.is_empty());
        assert!(!object.faces.is_empty());
        assert!(!object.triangles.is_empty());
        assert_eq!(object.triangle_normals.len(), object.triangles.len());
        assert_eq!(object.triangle_vertex_normals.len(), object.triangles.len());
        assert_eq!(object.vertex_sources.len(), object.vertices.len());
        assert!(object.triangle_colors.iter().all(|c| c == "white"));
        assert!(object.is_successful);
        assert!(!object.mesh_id.is_nil());
        assert_eq!(object.nodes.len(), 1);
        assert_eq!(object.nodes[0].id, "n0");
        assert!(object.preview.is_some());
    }

    #[test]
    fn generate_resolves_edges_from_the_snapshot() {
        let mut snapshot = Snapshot { canvas: Canvas::default(), ..Default::default() };
        snapshot.root_component = "root".into();
        snapshot.parts.insert("p1".into(), Part::new("p1", attrs(&[])));
        snapshot.nodes.insert("n0".into(), Node::new("n0", attrs(&[("x", "0"), ("y", "0"), ("z", "0"), ("radius", "1"), ("partId", "p1")])));
        snapshot.nodes.insert("n1".into(), Node::new("n1", attrs(&[("x", "0"), ("y", "0"), ("z", "5"), ("radius", "1"), ("partId", "p1")])));
        snapshot.edges.insert("e0".into(), crate::snapshot::Edge::new("e0", attrs(&[("from", "n0"), ("to", "n1"), ("partId", "p1")])));
        snapshot.components.insert("root".into(), Component::new("root", attrs(&[("children", "leaf")])));
        snapshot.components.insert("leaf".into(), Component::new("leaf", attrs(&[("linkDataType", "partId"), ("linkData", "p1")])));

        let mut generator = Generator::default();
        let object = generator.generate(&mut snapshot).unwrap();
        assert_eq!(object.edges.len(), 1);
        assert_eq!(object.edges[0].id, "e0");
        assert_eq!(object.edges[0].from, "n0");
        assert_eq!(object.edges[0].to, "n1");
    }

    #[test]
    fn generate_marks_the_object_unsuccessful_when_a_part_fails_to_build() {
        let mut snapshot = Snapshot { canvas: Canvas::default(), ..Default::default() };
        snapshot.root_component = "root".into();
        snapshot.parts.insert("p1".into(), Part::new("p1", attrs(&[])));
        snapshot.components.insert("root".into(), Component::new("root", attrs(&[("children", "leaf")])));
        snapshot.components.insert("leaf".into(), Component::new("leaf", attrs(&[("linkDataType", "partId"), ("linkData", "p1")])));

        let mut generator = Generator::default();
        let object = generator.generate(&mut snapshot).unwrap();
        assert!(!object.is_successful);
    }

    #[test]
    fn generate_clears_dirty_flags_after_a_successful_run() {
        let mut snapshot = single_sphere_snapshot();
        snapshot.parts.get_mut("p1").unwrap().set_dirty(true);
        let mut generator = Generator::default();
        generator.generate(&mut snapshot).unwrap();
        assert!(!snapshot.parts["p1"].dirty());
    }

    #[test]
    fn generate_rejects_a_malformed_snapshot() {
        let mut snapshot = Snapshot::default();
        snapshot.root_component = "root".into();
        snapshot.components.insert("root".into(), Component::new("root", attrs(&[("children", "bad")])));
        snapshot.components.insert("bad".into(), Component::new("bad", attrs(&[])));
        let mut generator = Generator::default();
        assert!(generator.generate(&mut snapshot).is_err());
    }

    #[test]
    fn second_generate_reuses_the_part_cache_when_nothing_is_dirty() {
        let mut snapshot = single_sphere_snapshot();
        let mut generator = Generator::default();
        let first = generator.generate(&mut snapshot).unwrap();
        assert!(generator.cache.part_cache.contains_key("p1"));

        let second = generator.generate(&mut snapshot).unwrap();
        assert_eq!(first.vertices.len(), second.vertices.len());
        assert_eq!(first.faces.len(), second.faces.len());
    }
}
