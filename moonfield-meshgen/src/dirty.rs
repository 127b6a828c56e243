//! Recursive dirty-closure computation over the component tree, and the
//! combination-cache eviction rule driven by it.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::attrs::AttrReader;
use crate::ids::nil_id;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Default)]
pub struct DirtySets {
    pub dirty_parts: HashSet<String>,
    pub dirty_components: HashSet<String>,
}

/// Returns `true` if `cut_face` names another part (by UUID) that is dirty.
fn cut_face_references_dirty_part(cut_face: Option<&str>, dirty_parts: &HashSet<String>) -> bool {
    match cut_face {
        Some(s) if Uuid::parse_str(s).is_ok() => dirty_parts.contains(s),
        _ => false,
    }
}

fn is_part_dirty(part_id: &str, snapshot: &Snapshot, dirty_parts: &HashSet<String>) -> bool {
    match snapshot.parts.get(part_id) {
        Some(part) => part.dirty() || cut_face_references_dirty_part(part.cut_face(), dirty_parts),
        None => false,
    }
}

fn is_component_dirty(
    component_id: &str,
    snapshot: &Snapshot,
    dirty_parts: &HashSet<String>,
    memo: &mut HashMap<String, bool>,
) -> bool {
    if let Some(cached) = memo.get(component_id) {
        return *cached;
    }
    // Break cycles conservatively: a component currently being evaluated is
    // provisionally treated as not-dirty-via-self-reference.
    memo.insert(component_id.to_string(), false);

    let Some(component) = snapshot.components.get(component_id) else {
        memo.insert(component_id.to_string(), false);
        return false;
    };

    let dirty = component.dirty()
        || (component.is_leaf()
            && component
                .link_data()
                .is_some_and(|part_id| is_part_dirty(part_id, snapshot, dirty_parts)))
        || component.children.iter().any(|child| is_component_dirty(child, snapshot, dirty_parts, memo));

    memo.insert(component_id.to_string(), dirty);
    dirty
}

/// Computes the full dirty closure: every dirty part id, and every
/// component id that is dirty itself, is a part leaf whose part (or its
/// cut-face dependency) is dirty, or has a dirty descendant. The virtual
/// root id is always included so the final combine proceeds.
pub fn compute_dirty_sets(snapshot: &Snapshot) -> DirtySets {
    let dirty_parts: HashSet<String> = snapshot.parts.values().filter(|p| p.dirty()).map(|p| p.id.clone()).collect();

    // Fixed-point: a part is also dirty if its cutFace references a dirty
    // part, so iterate until the set stops growing.
    let mut dirty_parts = dirty_parts;
    loop {
        let mut grew = false;
        let additions: Vec<String> = snapshot
            .parts
            .values()
            .filter(|p| !dirty_parts.contains(&p.id) && cut_face_references_dirty_part(p.cut_face(), &dirty_parts))
            .map(|p| p.id.clone())
            .collect();
        for id in additions {
            dirty_parts.insert(id);
            grew = true;
        }
        if !grew {
            break;
        }
    }

    let mut memo = HashMap::new();
    let mut dirty_components: HashSet<String> = snapshot
        .components
        .keys()
        .filter(|id| is_component_dirty(id, snapshot, &dirty_parts, &mut memo))
        .cloned()
        .collect();
    dirty_components.insert(nil_id());

    DirtySets { dirty_parts, dirty_components }
}

/// Evicts every combination-cache entry whose key string contains any dirty
/// component id as a substring.
pub fn evict_combination_cache<V>(cache: &mut HashMap<String, V>, dirty_components: &HashSet<String>) {
    cache.retain(|key, _| !dirty_components.iter().any(|dirty_id| key.contains(dirty_id.as_str())));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::AttrMap;
    use crate::snapshot::{Component, Part};

    fn attrs(pairs: &[(&str, &str)]) -> AttrMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn chain_snapshot() -> Snapshot {
        let mut s = Snapshot::default();
        s.root_component = "root".into();
        s.parts.insert("p1".into(), Part::new("p1", attrs(&[])));
        s.components.insert("root".into(), Component::new("root", attrs(&[("children", "mid")])));
        s.components.insert("mid".into(), Component::new("mid", attrs(&[("children", "leaf")])));
        s.components.insert("leaf".into(), Component::new("leaf", attrs(&[("linkDataType", "partId"), ("linkData", "p1")])));
        s
    }

    #[test]
    fn clean_snapshot_has_no_dirty_components_except_root() {
        let snapshot = chain_snapshot();
        let dirty = compute_dirty_sets(&snapshot);
        assert!(dirty.dirty_parts.is_empty());
        assert_eq!(dirty.dirty_components, HashSet::from([nil_id()]));
    }

    #[test]
    fn dirty_leaf_propagates_to_every_ancestor() {
        let mut snapshot = chain_snapshot();
        snapshot.parts.get_mut("p1").unwrap().set_dirty(true);

        let dirty = compute_dirty_sets(&snapshot);
        assert!(dirty.dirty_parts.contains("p1"));
        assert!(dirty.dirty_components.contains("leaf"));
        assert!(dirty.dirty_components.contains("mid"));
        assert!(dirty.dirty_components.contains("root"));
    }

    #[test]
    fn cut_face_dependency_propagates_dirtiness() {
        let mut snapshot = chain_snapshot();
        snapshot.parts.insert("p2".into(), Part::new("p2", attrs(&[("cutFace", "p1")])));
        // cutFace only propagates when it names a *UUID*.
        let uuid_id = uuid::Uuid::new_v4().to_string();
        snapshot.parts.insert(uuid_id.clone(), Part::new(uuid_id.clone(), attrs(&[("__dirty", "true")])));
        snapshot.parts.insert("p3".into(), Part::new("p3", attrs(&[("cutFace", uuid_id.as_str())])));
        snapshot.components.insert("leaf3".into(), Component::new("leaf3", attrs(&[("linkDataType", "partId"), ("linkData", "p3")])));
        snapshot.components.get_mut("root").unwrap().children.push("leaf3".into());

        let dirty = compute_dirty_sets(&snapshot);
        assert!(dirty.dirty_parts.contains("p3"));
        assert!(dirty.dirty_components.contains("leaf3"));
    }

    #[test]
    fn eviction_removes_keys_containing_dirty_id() {
        let mut cache: HashMap<String, ()> = HashMap::new();
        cache.insert("aaa+bbb!".to_string(), ());
        cache.insert("ccc+ddd!".to_string(), ());
        let dirty = HashSet::from(["bbb".to_string()]);
        evict_combination_cache(&mut cache, &dirty);
        assert!(!cache.contains_key("aaa+bbb!"));
        assert!(cache.contains_key("ccc+ddd!"));
    }
}
