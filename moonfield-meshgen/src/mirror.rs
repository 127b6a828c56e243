//! Synthesizes mirrored twin parts and twin components for every part
//! flagged `xMirrored`, ahead of dirty analysis and meshing.

use crate::attrs::AttrReader;
use crate::ids::mirror_id;
use crate::snapshot::{Component, Edge, Node, Part, Snapshot};

/// Finds the (single) parent of a component in the tree, or `None` if it is
/// the root (or unparented, which is treated the same as root).
fn find_parent(snapshot: &Snapshot, component_id: &str) -> Option<String> {
    snapshot
        .components
        .values()
        .find(|c| c.children.iter().any(|child| child == component_id))
        .map(|c| c.id.clone())
}

/// Runs mirror preprocessing in place. Idempotent: re-running against a
/// snapshot that already has twins for every `xMirrored` part is a no-op,
/// since twins are looked up by their deterministic id before being created.
pub fn preprocess_mirrors(snapshot: &mut Snapshot) {
    let mirrored_part_ids: Vec<String> =
        snapshot.parts.values().filter(|p| p.x_mirrored() && p.mirror_from_part_id().is_none()).map(|p| p.id.clone()).collect();

    for source_part_id in mirrored_part_ids {
        let twin_part_id = mirror_id(&source_part_id);
        if snapshot.parts.contains_key(&twin_part_id) {
            continue;
        }

        let mut twin_attrs = snapshot.parts[&source_part_id].attrs.clone();
        twin_attrs.insert("__mirrorFromPartId".to_string(), source_part_id.clone());
        twin_attrs.insert("__dirty".to_string(), "true".to_string());
        twin_attrs.remove("xMirrored");
        let twin_part = Part::new(twin_part_id.clone(), twin_attrs);
        snapshot.parts.insert(twin_part_id.clone(), twin_part);

        if let Some(source_part) = snapshot.parts.get_mut(&source_part_id) {
            source_part.attrs.insert("__mirroredByPartId".to_string(), twin_part_id.clone());
        }

        // Clone the source part's node/edge skeleton onto the twin part id,
        // so the twin has its own buildable topology. The twin's node
        // positions are left untouched here; reflection across the x axis
        // happens on the built mesh in part mesh assembly, keyed off
        // `mirrorFromPartId`.
        let source_edge_ids: Vec<String> =
            snapshot.edges.values().filter(|e| e.part_id() == Some(source_part_id.as_str())).map(|e| e.id.clone()).collect();

        let mut node_id_map: std::collections::HashMap<String, String> = std::collections::HashMap::new();
        for edge_id in &source_edge_ids {
            let edge = &snapshot.edges[edge_id];
            for node_id in [edge.from(), edge.to()].into_iter().flatten() {
                node_id_map.entry(node_id.to_string()).or_insert_with(|| mirror_id(node_id));
            }
        }
        // A node can belong to the source part without any edge at all (a
        // lone-node part, e.g. a single sphere skeleton); pick those up too
        // so the twin gets its own copy.
        for node in snapshot.nodes.values() {
            if node.part_id() == Some(source_part_id.as_str()) {
                node_id_map.entry(node.id.clone()).or_insert_with(|| mirror_id(&node.id));
            }
        }

        for (source_node_id, twin_node_id) in &node_id_map {
            let mut node_attrs = snapshot.nodes[source_node_id].attrs.clone();
            if snapshot.nodes[source_node_id].part_id() == Some(source_part_id.as_str()) {
                node_attrs.insert("partId".to_string(), twin_part_id.clone());
            }
            snapshot.nodes.insert(twin_node_id.clone(), Node::new(twin_node_id.clone(), node_attrs));
        }

        for edge_id in &source_edge_ids {
            let twin_edge_id = mirror_id(edge_id);
            let edge = &snapshot.edges[edge_id];
            let mut twin_edge_attrs = edge.attrs.clone();
            if let Some(from) = edge.from() {
                twin_edge_attrs.insert("from".to_string(), node_id_map[from].clone());
            }
            if let Some(to) = edge.to() {
                twin_edge_attrs.insert("to".to_string(), node_id_map[to].clone());
            }
            twin_edge_attrs.insert("partId".to_string(), twin_part_id.clone());
            snapshot.edges.insert(twin_edge_id.clone(), Edge::new(twin_edge_id, twin_edge_attrs));
        }

        // Find every component that links to the source part, and append a
        // twin component as a sibling under the same parent.
        let linking_components: Vec<String> = snapshot
            .components
            .values()
            .filter(|c| c.is_leaf() && c.link_data() == Some(source_part_id.as_str()))
            .map(|c| c.id.clone())
            .collect();

        for source_component_id in linking_components {
            let twin_component_id = mirror_id(&source_component_id);
            if snapshot.components.contains_key(&twin_component_id) {
                continue;
            }

            let mut twin_component_attrs = snapshot.components[&source_component_id].attrs.clone();
            twin_component_attrs.insert("linkData".to_string(), twin_part_id.clone());
            twin_component_attrs.remove("children");
            twin_component_attrs.insert("__dirty".to_string(), "true".to_string());
            let twin_component = Component::new(twin_component_id.clone(), twin_component_attrs);
            snapshot.components.insert(twin_component_id.clone(), twin_component);

            let parent_id = find_parent(snapshot, &source_component_id).unwrap_or_else(|| snapshot.root_component.clone());
            if let Some(parent) = snapshot.components.get_mut(&parent_id) {
                parent.children.push(twin_component_id.clone());
                let csv = parent.children.join(",");
                parent.attrs.insert("children".to_string(), csv);
            }
        }
    }
}
