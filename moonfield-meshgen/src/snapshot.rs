//! The immutable-on-entry scene snapshot: canvas origin, parts, nodes,
//! edges and the component tree, plus the part→{node, edge} adjacency index
//! built from it.

use std::collections::{HashMap, HashSet};

use crate::attrs::{AttrMap, AttrReader};
use crate::geometry::Vec3;
use crate::ids::nil_id;

#[derive(Debug, Clone, Copy, Default)]
pub struct Canvas {
    pub origin_x: f64,
    pub origin_y: f64,
    pub origin_z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Model,
    CutFace,
    Other,
}

impl Target {
    fn from_attr(s: Option<&str>) -> Self {
        match s {
            Some("Model") | None => Target::Model,
            Some("CutFace") => Target::CutFace,
            Some(_) => Target::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseAxis {
    YZ,
    XY,
    ZX,
    Average,
}

impl BaseAxis {
    fn from_attr(s: Option<&str>) -> Self {
        match s {
            Some("XY") => BaseAxis::XY,
            Some("ZX") => BaseAxis::ZX,
            Some("Average") => BaseAxis::Average,
            _ => BaseAxis::YZ,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMode {
    Normal,
    Inversion,
    Uncombined,
}

impl CombineMode {
    fn from_attrs(attrs: &AttrMap) -> Self {
        let mode = match attrs.read_str("combineMode") {
            Some("Inversion") => CombineMode::Inversion,
            Some("Uncombined") => CombineMode::Uncombined,
            _ => CombineMode::Normal,
        };
        // A Normal component flagged `inverse` behaves as an Inversion.
        if mode == CombineMode::Normal && attrs.read_bool("inverse") {
            CombineMode::Inversion
        } else {
            mode
        }
    }
}

#[derive(Debug, Clone)]
pub struct Part {
    pub id: String,
    pub attrs: AttrMap,
}

impl Part {
    pub fn new(id: impl Into<String>, attrs: AttrMap) -> Self {
        Self { id: id.into(), attrs }
    }

    pub fn disabled(&self) -> bool {
        self.attrs.read_bool("disabled")
    }
    pub fn subdived(&self) -> bool {
        self.attrs.read_bool("subdived")
    }
    pub fn rounded(&self) -> bool {
        self.attrs.read_bool("rounded")
    }
    pub fn chamfered(&self) -> bool {
        self.attrs.read_bool("chamfered")
    }
    pub fn countershaded(&self) -> bool {
        self.attrs.read_bool("countershaded")
    }
    pub fn smooth(&self) -> bool {
        self.attrs.read_bool("smooth")
    }
    pub fn color(&self) -> Option<&str> {
        self.attrs.read_str("color")
    }
    pub fn deform_thickness(&self) -> f64 {
        self.attrs.read_float("deformThickness", 1.0)
    }
    pub fn deform_width(&self) -> f64 {
        self.attrs.read_float("deformWidth", 1.0)
    }
    pub fn deform_unified(&self) -> bool {
        self.attrs.read_bool("deformUnified")
    }
    pub fn cut_rotation(&self) -> f64 {
        self.attrs.read_float("cutRotation", 0.0)
    }
    pub fn hollow_thickness(&self) -> f64 {
        self.attrs.read_float("hollowThickness", 0.0)
    }
    pub fn cut_face(&self) -> Option<&str> {
        self.attrs.read_str("cutFace")
    }
    pub fn target(&self) -> Target {
        Target::from_attr(self.attrs.read_str("target"))
    }
    pub fn base(&self) -> BaseAxis {
        BaseAxis::from_attr(self.attrs.read_str("base"))
    }
    pub fn roughness(&self) -> f64 {
        self.attrs.read_float("roughness", 1.0)
    }
    pub fn metallic(&self) -> f64 {
        self.attrs.read_float("metallic", 0.0)
    }
    pub fn color_solubility(&self) -> f64 {
        self.attrs.read_float("colorSolubility", 0.0)
    }
    pub fn x_mirrored(&self) -> bool {
        self.attrs.read_bool("xMirrored")
    }
    pub fn mirror_from_part_id(&self) -> Option<&str> {
        self.attrs.read_str("__mirrorFromPartId")
    }
    pub fn mirrored_by_part_id(&self) -> Option<&str> {
        self.attrs.read_str("__mirroredByPartId")
    }
    pub fn dirty(&self) -> bool {
        self.attrs.read_bool("__dirty")
    }
    pub fn set_dirty(&mut self, dirty: bool) {
        self.attrs.insert("__dirty".to_string(), dirty.to_string());
    }

    /// A part is eligible for the intermediate-node retry unless it
    /// references an external fill mesh, which the retry cannot repair.
    pub fn is_retry_eligible(&self) -> bool {
        self.attrs.read_str("fillMesh").is_none()
    }

    /// `true` iff this part's mesh should be joined into the final object.
    pub fn joined(&self) -> bool {
        self.target() == Target::Model && !self.disabled()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub attrs: AttrMap,
}

impl Node {
    pub fn new(id: impl Into<String>, attrs: AttrMap) -> Self {
        Self { id: id.into(), attrs }
    }

    pub fn radius(&self) -> f64 {
        self.attrs.read_float("radius", 0.0)
    }
    pub fn x(&self) -> f64 {
        self.attrs.read_float("x", 0.0)
    }
    pub fn y(&self) -> f64 {
        self.attrs.read_float("y", 0.0)
    }
    pub fn z(&self) -> f64 {
        self.attrs.read_float("z", 0.0)
    }
    pub fn cut_face(&self) -> Option<&str> {
        self.attrs.read_str("cutFace")
    }
    pub fn cut_rotation(&self) -> Option<f64> {
        self.attrs.read_str("cutRotation").map(|_| self.attrs.read_float("cutRotation", 0.0))
    }
    /// The part this node belongs to, independent of any edge. A node that
    /// sits alone in a part (no edges at all, e.g. a single-sphere skeleton)
    /// still carries this attribute directly.
    pub fn part_id(&self) -> Option<&str> {
        self.attrs.read_str("partId")
    }

    /// Node position relative to the canvas origin:
    /// `(x - originX, originY - y, originZ - z)`.
    pub fn position(&self, canvas: &Canvas) -> Vec3 {
        Vec3::new(
            self.x() - canvas.origin_x,
            canvas.origin_y - self.y(),
            canvas.origin_z - self.z(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: String,
    pub attrs: AttrMap,
}

impl Edge {
    pub fn new(id: impl Into<String>, attrs: AttrMap) -> Self {
        Self { id: id.into(), attrs }
    }

    pub fn from(&self) -> Option<&str> {
        self.attrs.read_str("from")
    }
    pub fn to(&self) -> Option<&str> {
        self.attrs.read_str("to")
    }
    pub fn part_id(&self) -> Option<&str> {
        self.attrs.read_str("partId")
    }
}

#[derive(Debug, Clone)]
pub struct Component {
    pub id: String,
    pub attrs: AttrMap,
    pub children: Vec<String>,
}

impl Component {
    pub fn new(id: impl Into<String>, attrs: AttrMap) -> Self {
        let children = attrs
            .read_str("children")
            .map(|csv| csv.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        Self { id: id.into(), attrs, children }
    }

    pub fn is_leaf(&self) -> bool {
        self.attrs.read_str("linkDataType") == Some("partId")
    }

    pub fn link_data(&self) -> Option<&str> {
        self.attrs.read_str("linkData")
    }

    pub fn combine_mode(&self) -> CombineMode {
        CombineMode::from_attrs(&self.attrs)
    }

    pub fn dirty(&self) -> bool {
        self.attrs.read_bool("__dirty")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub canvas: Canvas,
    pub parts: HashMap<String, Part>,
    pub nodes: HashMap<String, Node>,
    pub edges: HashMap<String, Edge>,
    pub components: HashMap<String, Component>,
    pub root_component: String,
}

impl Snapshot {
    /// Validates the one hard structural invariant that is a true error
    /// rather than data-authoring-in-progress: every non-root component is
    /// either a part leaf or has at least one child.
    pub fn validate(&self) -> Result<(), crate::error::MeshGenError> {
        for (id, component) in &self.components {
            if *id == self.root_component || *id == nil_id() {
                continue;
            }
            if !component.is_leaf() && component.children.is_empty() {
                return Err(crate::error::MeshGenError::MalformedComponent(id.clone()));
            }
        }
        Ok(())
    }
}

/// Part → {node ids} and part → {edge ids} adjacency. A node belongs to a
/// part if any edge of that part references it, OR if the node carries that
/// part's id directly on its own `partId` attribute — the latter is what
/// lets a lone, edge-less node (a single-sphere skeleton) still resolve to
/// its part.
#[derive(Debug, Clone, Default)]
pub struct SnapshotIndex {
    pub part_nodes: HashMap<String, HashSet<String>>,
    pub part_edges: HashMap<String, HashSet<String>>,
}

impl SnapshotIndex {
    pub fn build(snapshot: &Snapshot) -> Self {
        let mut part_nodes: HashMap<String, HashSet<String>> = HashMap::new();
        let mut part_edges: HashMap<String, HashSet<String>> = HashMap::new();

        for node in snapshot.nodes.values() {
            if let Some(part_id) = node.part_id() {
                part_nodes.entry(part_id.to_string()).or_default().insert(node.id.clone());
            }
        }

        for edge in snapshot.edges.values() {
            let Some(part_id) = edge.part_id() else { continue };
            part_edges.entry(part_id.to_string()).or_default().insert(edge.id.clone());

            let nodes = part_nodes.entry(part_id.to_string()).or_default();
            if let Some(from) = edge.from() {
                if snapshot.nodes.contains_key(from) {
                    nodes.insert(from.to_string());
                }
            }
            if let Some(to) = edge.to() {
                if snapshot.nodes.contains_key(to) {
                    nodes.insert(to.to_string());
                }
            }
        }

        Self { part_nodes, part_edges }
    }

    pub fn nodes_of(&self, part_id: &str) -> Vec<String> {
        self.part_nodes.get(part_id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn edges_of(&self, part_id: &str) -> Vec<String> {
        self.part_edges.get(part_id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn node_position_reflects_canvas_origin() {
        let canvas = Canvas { origin_x: 1.0, origin_y: 2.0, origin_z: 3.0 };
        let node = Node::new("n1", attrs(&[("x", "5"), ("y", "1"), ("z", "0")]));
        let p = node.position(&canvas);
        assert_eq!(p, Vec3::new(4.0, 1.0, 3.0));
    }

    #[test]
    fn combine_mode_inverse_flag_promotes_normal_to_inversion() {
        let c = Component::new("c1", attrs(&[("combineMode", "Normal"), ("inverse", "true")]));
        assert_eq!(c.combine_mode(), CombineMode::Inversion);
    }

    #[test]
    fn component_children_parses_csv() {
        let c = Component::new("c1", attrs(&[("children", "a, b ,c")]));
        assert_eq!(c.children, vec!["a", "b", "c"]);
    }

    #[test]
    fn index_builds_part_adjacency_from_edges() {
        let mut snapshot = Snapshot::default();
        snapshot.nodes.insert("n1".into(), Node::new("n1", attrs(&[])));
        snapshot.nodes.insert("n2".into(), Node::new("n2", attrs(&[])));
        snapshot.edges.insert(
            "e1".into(),
            Edge::new("e1", attrs(&[("from", "n1"), ("to", "n2"), ("partId", "p1")])),
        );
        let index = SnapshotIndex::build(&snapshot);
        let mut nodes = index.nodes_of("p1");
        nodes.sort();
        assert_eq!(nodes, vec!["n1".to_string(), "n2".to_string()]);
        assert_eq!(index.edges_of("p1"), vec!["e1".to_string()]);
    }

    #[test]
    fn index_associates_a_lone_edgeless_node_via_its_own_part_id() {
        let mut snapshot = Snapshot::default();
        snapshot.nodes.insert("n0".into(), Node::new("n0", attrs(&[("partId", "p1")])));
        let index = SnapshotIndex::build(&snapshot);
        assert_eq!(index.nodes_of("p1"), vec!["n0".to_string()]);
        assert!(index.edges_of("p1").is_empty());
    }

    #[test]
    fn validate_rejects_non_leaf_without_children() {
        let mut snapshot = Snapshot::default();
        snapshot.root_component = "root".into();
        snapshot.components.insert("root".into(), Component::new("root", attrs(&[("children", "bad")])));
        snapshot.components.insert("bad".into(), Component::new("bad", attrs(&[])));
        assert!(snapshot.validate().is_err());
    }
}
