//! Cut template extraction: deriving a 2D sweep cross-section either from a
//! referenced part's node graph, or from a named preset polygon.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::geometry::Vec2;
use crate::snapshot::{Snapshot, SnapshotIndex};

pub type Polygon2 = Vec<Vec2>;

/// Canonical unit preset polygons, resolved case-insensitively. An unknown
/// name falls back to `Ring`, a thin annulus used as a degenerate default.
pub mod presets {
    use super::*;
    use std::f64::consts::TAU;

    fn regular_polygon(sides: usize, radius: f64) -> Polygon2 {
        (0..sides)
            .map(|i| {
                let angle = TAU * (i as f64) / (sides as f64) - std::f64::consts::FRAC_PI_2;
                Vec2::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect()
    }

    pub fn square() -> Polygon2 {
        vec![Vec2::new(-1.0, -1.0), Vec2::new(1.0, -1.0), Vec2::new(1.0, 1.0), Vec2::new(-1.0, 1.0)]
    }

    pub fn triangle() -> Polygon2 {
        regular_polygon(3, 1.0)
    }

    pub fn pentagon() -> Polygon2 {
        regular_polygon(5, 1.0)
    }

    pub fn hexagon() -> Polygon2 {
        regular_polygon(6, 1.0)
    }

    pub fn octagon() -> Polygon2 {
        regular_polygon(8, 1.0)
    }

    pub fn rounded_square() -> Polygon2 {
        regular_polygon(16, 1.0)
    }

    pub fn ring() -> Polygon2 {
        regular_polygon(12, 1.0)
    }

    pub fn by_name(name: &str) -> Polygon2 {
        match name.to_ascii_lowercase().as_str() {
            "square" => square(),
            "triangle" => triangle(),
            "pentagon" => pentagon(),
            "hexagon" => hexagon(),
            "octagon" => octagon(),
            "roundedsquare" => rounded_square(),
            "ring" => ring(),
            _ => ring(),
        }
    }
}

/// Replaces each edge `(p_i, p_{i+1})` with two points at 0.8/0.2 and
/// 0.2/0.8 blends, doubling the vertex count while preserving winding.
pub fn chamfer(polygon: &[Vec2]) -> Polygon2 {
    let n = polygon.len();
    let mut out = Vec::with_capacity(n * 2);
    for i in 0..n {
        let p0 = polygon[i];
        let p1 = polygon[(i + 1) % n];
        out.push(p0 * 0.8 + p1 * 0.2);
        out.push(p0 * 0.2 + p1 * 0.8);
    }
    out
}

struct WalkedNode {
    id: String,
    x: f64,
    y: f64,
    #[allow(dead_code)]
    radius: f64,
}

fn build_adjacency(part_id: &str, snapshot: &Snapshot, index: &SnapshotIndex) -> HashMap<String, Vec<String>> {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    for node_id in index.nodes_of(part_id) {
        adjacency.entry(node_id).or_default();
    }
    for edge_id in index.edges_of(part_id) {
        let Some(edge) = snapshot.edges.get(&edge_id) else { continue };
        let (Some(from), Some(to)) = (edge.from(), edge.to()) else { continue };
        if !snapshot.nodes.contains_key(from) || !snapshot.nodes.contains_key(to) {
            continue;
        }
        adjacency.entry(from.to_string()).or_default().push(to.to_string());
        adjacency.entry(to.to_string()).or_default().push(from.to_string());
    }
    adjacency
}

/// Picks the walk's starting node: any node if the graph is a ring (every
/// node has degree 2); among degree-1 endpoints of a chain, the one whose
/// direction from the centroid is closest to `normalize(-1,-1,0)`
/// (projected onto the 2D cut plane as `(-1,-1)`), ties broken by
/// insertion/iteration order.
fn choose_start(nodes_in_order: &[String], adjacency: &HashMap<String, Vec<String>>, table: &HashMap<String, (f64, f64)>) -> Option<String> {
    if nodes_in_order.is_empty() {
        return None;
    }
    let endpoints: Vec<&String> = nodes_in_order.iter().filter(|id| adjacency.get(*id).map(|n| n.len()).unwrap_or(0) == 1).collect();

    if endpoints.is_empty() {
        // Ring (or isolated node): any node suffices.
        return nodes_in_order.first().cloned();
    }

    let (cx, cy) = {
        let (mut sx, mut sy) = (0.0, 0.0);
        for id in nodes_in_order {
            let (x, y) = table[id];
            sx += x;
            sy += y;
        }
        let n = nodes_in_order.len() as f64;
        (sx / n, sy / n)
    };

    let reference = Vec2::new(-1.0, -1.0).normalize();
    let mut best: Option<(&String, f64)> = None;
    for id in &endpoints {
        let (x, y) = table[*id];
        let dir = Vec2::new(x - cx, y - cy);
        if dir.norm() < f64::EPSILON {
            continue;
        }
        let dir = dir.normalize();
        let cos_angle = (dir.x * reference.x + dir.y * reference.y).clamp(-1.0, 1.0);
        let angle = cos_angle.acos();
        match best {
            Some((_, best_angle)) if angle >= best_angle => {}
            _ => best = Some((id, angle)),
        }
    }
    best.map(|(id, _)| id.clone()).or_else(|| endpoints.first().map(|s| (*s).clone()))
}

/// Walks the graph from the chosen start, at each step advancing to the
/// first unvisited neighbor (in adjacency-list order), emitting nodes in
/// walk order.
fn walk(start: &str, adjacency: &HashMap<String, Vec<String>>) -> Vec<String> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut current = start.to_string();
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
}

/// Extracts a 2D cut polygon from the node graph of the part named by
/// `cut_face` (a UUID string). Returns `None` if `cut_face` does not name
/// an existing part, leaving the caller to fall back to a preset.
fn extract_from_referenced_part(cut_face: &str, snapshot: &Snapshot, index: &SnapshotIndex) -> Option<Polygon2> {
    if Uuid::parse_str(cut_face).is_err() {
        return None;
    }
    let referenced_part = snapshot.parts.get(cut_face)?;

    let mut nodes_in_order: Vec<String> = index.nodes_of(&referenced_part.id);
    nodes_in_order.sort();
    if nodes_in_order.is_empty() {
        return None;
    }

    let mut table: HashMap<String, (f64, f64)> = HashMap::new();
    let mut radii: HashMap<String, f64> = HashMap::new();
    for id in &nodes_in_order {
        let Some(node) = snapshot.nodes.get(id) else { continue };
        table.insert(id.clone(), (node.x() - snapshot.canvas.origin_x, snapshot.canvas.origin_y - node.y()));
        radii.insert(id.clone(), node.radius());
    }

    let adjacency = build_adjacency(&referenced_part.id, snapshot, index);
    let start = choose_start(&nodes_in_order, &adjacency, &table)?;
    let walked_ids = walk(&start, &adjacency);

    let walked: Vec<WalkedNode> = walked_ids
        .into_iter()
        .filter_map(|id| {
            let (x, y) = *table.get(&id)?;
            let radius = *radii.get(&id)?;
            Some(WalkedNode { id, x, y, radius })
        })
        .collect();

    Some(cut_face_points_from_walk(&walked))
}

/// The "cut-face-points generator": turns a walked `(radius, x, y, id)`
/// sequence into the 2D polygon swept along the skeleton. The radius only
/// participates in establishing walk order upstream; the polygon itself is
/// the walked (x, y) sequence.
fn cut_face_points_from_walk(walked: &[WalkedNode]) -> Polygon2 {
    walked.iter().map(|n| Vec2::new(n.x, n.y)).collect()
}

/// Resolves a part's `cutFace` attribute (or a per-node override) into a
/// concrete 2D polygon, applying the preset fallback and chamfering.
pub fn resolve_cut_template(cut_face: &str, chamfered: bool, snapshot: &Snapshot, index: &SnapshotIndex) -> Polygon2 {
    let mut polygon = extract_from_referenced_part(cut_face, snapshot, index).unwrap_or_default();
    if polygon.len() < 3 {
        polygon = presets::by_name(cut_face);
    }
    if chamfered {
        polygon = chamfer(&polygon);
    }
    polygon
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttrMap;
    use crate::snapshot::{Canvas, Edge, Node, Part};

    fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn chamfer_doubles_vertex_count_and_preserves_winding() {
        let square = presets::square();
        let chamfered = chamfer(&square);
        assert_eq!(chamfered.len(), square.len() * 2);

        // Signed area (shoelace) sign is preserved (winding unchanged).
        let signed_area = |poly: &[Vec2]| -> f64 {
            let n = poly.len();
            let mut sum = 0.0;
            for i in 0..n {
                let a = poly[i];
                let b = poly[(i + 1) % n];
                sum += a.x * b.y - b.x * a.y;
            }
            sum
        };
        assert_eq!(signed_area(&square).signum(), signed_area(&chamfered).signum());
    }

    #[test]
    fn unknown_preset_name_falls_back_to_ring() {
        assert_eq!(presets::by_name("bogus"), presets::ring());
    }

    #[test]
    fn preset_square_has_four_vertices() {
        assert_eq!(presets::square().len(), 4);
    }

    #[test]
    fn resolve_cut_template_falls_back_to_preset_for_non_uuid_name() {
        let snapshot = Snapshot::default();
        let index = SnapshotIndex::default();
        let polygon = resolve_cut_template("Square", false, &snapshot, &index);
        assert_eq!(polygon.len(), 4);
    }

    #[test]
    fn extract_from_referenced_part_walks_a_ring() {
        let mut snapshot = Snapshot { canvas: Canvas::default(), ..Default::default() };
        let part_id = Uuid::new_v4().to_string();
        snapshot.parts.insert(part_id.clone(), Part::new(part_id.clone(), attrs(&[])));
        for (id, x, y) in [("n0", 1.0, 0.0), ("n1", 0.0, 1.0), ("n2", -1.0, 0.0), ("n3", 0.0, -1.0)] {
            snapshot.nodes.insert(id.into(), Node::new(id, attrs(&[("x", &x.to_string()), ("y", &y.to_string()), ("radius", "1")])));
        }
        for (i, (a, b)) in [("n0", "n1"), ("n1", "n2"), ("n2", "n3"), ("n3", "n0")].into_iter().enumerate() {
            snapshot.edges.insert(
                format!("e{i}"),
                Edge::new(format!("e{i}"), attrs(&[("from", a), ("to", b), ("partId", part_id.as_str())])),
            );
        }
        let index = SnapshotIndex::build(&snapshot);
        let polygon = resolve_cut_template(&part_id, false, &snapshot, &index);
        assert_eq!(polygon.len(), 4);
    }
}
