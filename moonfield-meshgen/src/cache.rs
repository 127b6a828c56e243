//! Owns the generator's per-part, per-component and combination caches, and
//! the invalidation/eviction lifecycle driven by dirty analysis and by
//! entities that vanished from the snapshot entirely.

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::collaborators::CsgMesh;
use crate::combine::CombinationCache;
use crate::dirty::{DirtySets, evict_combination_cache};
use crate::geometry::{PositionKey, Vec3};
use crate::part_mesh::PartCacheEntry;

/// A component's cached contribution to the tree: its CSG-accumulated
/// mesh, the submeshes that bypass CSG (`Uncombined` children and
/// non-combinable builds, bubbled up from descendants), the set of
/// vertex positions that existed before any CSG step ran anywhere in this
/// subtree — the `noneSeamVertices` protected from the final weld pass —
/// whether every part in this subtree built successfully, and the
/// presentational graph data (node/edge ids and resolved node positions)
/// unioned from every descendant.
#[derive(Debug, Clone, Default)]
pub struct ComponentCacheEntry {
    pub mesh: Option<CsgMesh>,
    pub uncombined: Vec<CsgMesh>,
    pub incombinable: Vec<CsgMesh>,
    pub none_seam_positions: HashSet<PositionKey>,
    pub is_successful: bool,
    pub object_nodes: HashSet<String>,
    pub object_edges: HashSet<String>,
    pub object_node_vertices: HashMap<String, Vec3>,
    pub previews: Vec<CsgMesh>,
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedCacheContext {
    pub part_cache: HashMap<String, PartCacheEntry>,
    pub component_cache: HashMap<String, ComponentCacheEntry>,
    pub combination_cache: CombinationCache,
}

impl GeneratedCacheContext {
    /// Drops every cache entry made stale by the given dirty sets: parts
    /// and components rebuild from scratch, and any combination-cache key
    /// that mentions a dirty component id is evicted.
    pub fn invalidate(&mut self, dirty: &DirtySets) {
        let before = self.combination_cache.len();
        for part_id in &dirty.dirty_parts {
            self.part_cache.remove(part_id);
        }
        for component_id in &dirty.dirty_components {
            self.component_cache.remove(component_id);
        }
        evict_combination_cache(&mut self.combination_cache, &dirty.dirty_components);
        let evicted = before.saturating_sub(self.combination_cache.len());
        if evicted > 0 {
            info!(evicted, "evicted stale combination cache entries");
        }
    }

    /// Drops cache entries for parts and components no longer present in
    /// the current snapshot, so the cache does not grow unbounded across a
    /// long-lived editing session.
    pub fn free_vanished(&mut self, live_part_ids: &HashSet<String>, live_component_ids: &HashSet<String>) {
        self.part_cache.retain(|id, _| live_part_ids.contains(id));
        self.component_cache.retain(|id, _| live_component_ids.contains(id));
        self.combination_cache.retain(|key, _| {
            key.split(['+', '-', '!']).filter(|token| !token.is_empty()).all(|id| live_component_ids.contains(id))
        });
    }
}
