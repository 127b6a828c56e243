//! Component combination: groups a component's children into contiguous
//! runs by combine mode, combines each run left-to-right through the CSG
//! collaborator, and derives the cache key string the dirty-eviction rule
//! keys off of.

use std::collections::HashMap;

use tracing::{instrument, warn};

use crate::collaborators::{CombineMethod, CsgMesh, MeshCombiner, MeshRecombiner, triangulate};
use crate::geometry::is_watertight;
use crate::snapshot::CombineMode;

/// A memoized combination result: the mesh (`None` for a null CSG outcome)
/// plus whether that combine step itself succeeded — a null result or a
/// build that failed upstream both mark `successful: false`, which
/// `combine_multiple_meshes` folds into its overall `is_successful` flag so
/// a cached miss doesn't look identical to a cached, deliberate no-op.
#[derive(Debug, Clone)]
pub struct CachedCombination {
    pub mesh: Option<CsgMesh>,
    pub successful: bool,
}

pub type CombinationCache = HashMap<String, CachedCombination>;

/// The result of combining a component's children: the CSG-accumulated
/// mesh (if any), plus the children that bypassed CSG entirely — kept
/// separate, not unioned — because they were either `Uncombined` by mode
/// or non-manifold and therefore not `isCombinable()` — and whether every
/// combine step in this subtree produced a usable result.
#[derive(Debug, Clone, Default)]
pub struct CombineOutcome {
    pub mesh: Option<CsgMesh>,
    pub uncombined: Vec<CsgMesh>,
    pub incombinable: Vec<CsgMesh>,
    pub is_successful: bool,
}

/// A single child ready to combine: its component id (for cache-key
/// composition), its mode, and its already-built mesh (`None` if that
/// child itself produced nothing, e.g. a disabled or empty sub-combination).
#[derive(Debug, Clone)]
pub struct CombineInput {
    pub component_id: String,
    pub mode: CombineMode,
    pub mesh: Option<CsgMesh>,
}

/// Splits a component's ordered children into contiguous groups: a new
/// group starts whenever the combine mode changes from the previous child,
/// or whenever the current child's mode is `Inversion` (an inversion always
/// combines alone against the accumulated result of everything before it).
fn group_by_mode(inputs: &[CombineInput]) -> Vec<Vec<&CombineInput>> {
    let mut groups: Vec<Vec<&CombineInput>> = Vec::new();
    let mut previous_mode: Option<CombineMode> = None;

    for input in inputs {
        let starts_new_group = match previous_mode {
            None => true,
            Some(prev) => prev != input.mode || input.mode == CombineMode::Inversion,
        };
        if starts_new_group || groups.is_empty() {
            groups.push(Vec::new());
        }
        groups.last_mut().unwrap().push(input);
        previous_mode = Some(input.mode);
    }

    groups
}

/// Builds the combination cache key: `+` for each member of a Normal or
/// Uncombined group joined in order, `-` prefix for Inversion groups,
/// interleaved component ids, with a trailing `!` marking a group whose
/// result was recombined into quads.
pub fn combination_string(groups: &[Vec<&CombineInput>], recombined: bool) -> String {
    let mut key = String::new();
    for group in groups {
        for input in group {
            let sign = if input.mode == CombineMode::Inversion { '-' } else { '+' };
            key.push(sign);
            key.push_str(&input.component_id);
        }
    }
    if recombined {
        key.push('!');
    }
    key
}

/// Combines two meshes under the given method, logging and returning `None`
/// (a "null CSG" outcome, carried as data rather than an error) if either
/// operand is absent or the combiner itself fails to produce a result.
/// Returns whether this step itself succeeded: only a real combiner failure
/// with both operands present counts as unsuccessful — a deliberate
/// no-op (subtracting from nothing, both operands absent) is not a failure.
fn combine_two_meshes(combiner: &dyn MeshCombiner, method: CombineMethod, a: Option<&CsgMesh>, b: Option<&CsgMesh>) -> (Option<CsgMesh>, bool) {
    match (a, b) {
        (Some(a), Some(b)) => match combiner.combine(method, a, b) {
            Some(mesh) => (Some(mesh), true),
            None => {
                warn!(?method, "combine produced a null result");
                (None, false)
            }
        },
        (Some(a), None) => (Some(a.clone()), true),
        (None, Some(b)) if method != CombineMethod::Difference && method != CombineMethod::Intersection => (Some(b.clone()), true),
        _ => (None, true),
    }
}

/// `combineTwoMeshes`: runs the CSG combiner, then — since
/// `combineMultipleMeshes` always recombines — tries recovering quad
/// topology on the result and keeps the recombined mesh only if it is still
/// watertight; otherwise the raw CSG result is kept. The outcome (including
/// `None`, a null CSG result) is memoized under `key` so an identical
/// combination elsewhere in the tree, or an unchanged subtree on the next
/// generation, clones the cached mesh instead of recomputing it.
fn combine_two_meshes_cached(
    combiner: &dyn MeshCombiner,
    recombiner: &dyn MeshRecombiner,
    cache: &mut CombinationCache,
    key: &str,
    method: CombineMethod,
    a: Option<&CsgMesh>,
    b: Option<&CsgMesh>,
) -> (Option<CsgMesh>, bool) {
    let cache_key = format!("{key}!");
    if let Some(cached) = cache.get(&cache_key) {
        return (cached.mesh.clone(), cached.successful);
    }

    let (raw, successful) = combine_two_meshes(combiner, method, a, b);
    let result = raw.map(|mesh| {
        let recombined = recombiner.recombine(triangulate(mesh.clone()));
        if is_watertight(&recombined.faces) { recombined } else { mesh }
    });

    cache.insert(cache_key, CachedCombination { mesh: result.clone(), successful });
    (result, successful)
}

/// Combines a sequence of child meshes grouped by contiguous combine mode:
/// Normal groups union their members together and then union into the
/// running accumulator; Inversion groups subtract their (unioned) members
/// from the accumulator. `Uncombined` children never enter this grouping at
/// all — they are routed straight to [`CombineOutcome::uncombined`] — and a
/// Normal/Inversion child whose mesh is present but not `isCombinable()` (a
/// failed or non-manifold build) is routed to
/// [`CombineOutcome::incombinable`] instead of being fed into the CSG
/// accumulator. Every intermediate CSG step is looked up in and written back
/// to `cache` under the combination string accumulated so far (§4.5's
/// `combineMultipleMeshes`/`combineTwoMeshes`).
#[instrument(skip(combiner, recombiner, cache, inputs), fields(component_count = inputs.len()))]
pub fn combine_multiple_meshes(
    combiner: &dyn MeshCombiner,
    recombiner: &dyn MeshRecombiner,
    cache: &mut CombinationCache,
    inputs: &[CombineInput],
) -> CombineOutcome {
    let mut uncombined = Vec::new();
    let mut incombinable = Vec::new();
    let mut combinable_inputs: Vec<CombineInput> = Vec::new();

    for input in inputs {
        if let Some(mesh) = &input.mesh {
            if input.mode == CombineMode::Uncombined {
                uncombined.push(mesh.clone());
                continue;
            }
            if !mesh.is_combinable() {
                warn!(component_id = %input.component_id, "submesh is not combinable, routing into final object as-is");
                incombinable.push(mesh.clone());
                continue;
            }
        }
        combinable_inputs.push(input.clone());
    }

    let groups = group_by_mode(&combinable_inputs);
    let mut accumulator: Option<CsgMesh> = None;
    let mut accumulated_key = String::new();
    let mut is_successful = true;

    for group in groups {
        if group.is_empty() {
            continue;
        }
        let mode = group[0].mode;

        let mut group_mesh: Option<CsgMesh> = None;
        let mut group_key = String::new();
        for input in &group {
            let sign = if input.mode == CombineMode::Inversion { '-' } else { '+' };
            group_key.push(sign);
            group_key.push_str(&input.component_id);
            let (mesh, successful) =
                combine_two_meshes_cached(combiner, recombiner, cache, &group_key, CombineMethod::Union, group_mesh.as_ref(), input.mesh.as_ref());
            group_mesh = mesh;
            is_successful &= successful;
        }

        accumulated_key.push_str(&group_key);
        let combine_mode = if mode == CombineMode::Inversion { CombineMethod::Difference } else { CombineMethod::Union };
        let (mesh, successful) =
            combine_two_meshes_cached(combiner, recombiner, cache, &accumulated_key, combine_mode, accumulator.as_ref(), group_mesh.as_ref());
        accumulator = mesh;
        is_successful &= successful;
    }

    CombineOutcome { mesh: accumulator, uncombined, incombinable, is_successful }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{DefaultRecombiner, NaiveMeshCombiner};
    use crate::geometry::{Face, Vec3};
    use std::collections::HashSet;

    /// A closed, watertight tetrahedron — the smallest `isCombinable()` mesh
    /// — offset so two instances placed far apart stay disjoint.
    fn tetrahedron_mesh(offset: Vec3) -> CsgMesh {
        let vertices = vec![
            offset + Vec3::new(0.0, 0.0, 0.0),
            offset + Vec3::new(1.0, 0.0, 0.0),
            offset + Vec3::new(0.0, 1.0, 0.0),
            offset + Vec3::new(0.0, 0.0, 1.0),
        ];
        let faces = vec![Face::Tri([0, 1, 2]), Face::Tri([0, 3, 1]), Face::Tri([1, 3, 2]), Face::Tri([2, 3, 0])];
        let face_sources = vec![None; faces.len()];
        CsgMesh { vertices, faces, face_sources, shared_quad_edges: HashSet::new() }
    }

    /// A single open triangle — never `isCombinable()`, for exercising the
    /// non-combinable routing path.
    fn open_triangle_mesh(offset: Vec3) -> CsgMesh {
        CsgMesh {
            vertices: vec![offset, offset + Vec3::new(1.0, 0.0, 0.0), offset + Vec3::new(0.0, 1.0, 0.0)],
            faces: vec![Face::Tri([0, 1, 2])],
            face_sources: vec![None],
            shared_quad_edges: HashSet::new(),
        }
    }

    #[test]
    fn group_by_mode_splits_on_mode_change_and_inversion() {
        let inputs = vec![
            CombineInput { component_id: "a".into(), mode: CombineMode::Normal, mesh: None },
            CombineInput { component_id: "b".into(), mode: CombineMode::Normal, mesh: None },
            CombineInput { component_id: "c".into(), mode: CombineMode::Inversion, mesh: None },
            CombineInput { component_id: "d".into(), mode: CombineMode::Inversion, mesh: None },
        ];
        let groups = group_by_mode(&inputs);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
        assert_eq!(groups[2].len(), 1);
    }

    #[test]
    fn combination_string_marks_inversions_and_recombination() {
        let inputs = vec![
            CombineInput { component_id: "a".into(), mode: CombineMode::Normal, mesh: None },
            CombineInput { component_id: "b".into(), mode: CombineMode::Inversion, mesh: None },
        ];
        let groups = group_by_mode(&inputs);
        assert_eq!(combination_string(&groups, true), "+a-b!");
    }

    #[test]
    fn combine_multiple_meshes_unions_normal_group() {
        let combiner = NaiveMeshCombiner;
        let recombiner = DefaultRecombiner;
        let mut cache = CombinationCache::new();
        let inputs = vec![
            CombineInput { component_id: "a".into(), mode: CombineMode::Normal, mesh: Some(tetrahedron_mesh(Vec3::zeros())) },
            CombineInput { component_id: "b".into(), mode: CombineMode::Normal, mesh: Some(tetrahedron_mesh(Vec3::new(10.0, 10.0, 10.0))) },
        ];
        let outcome = combine_multiple_meshes(&combiner, &recombiner, &mut cache, &inputs);
        let result = outcome.mesh.clone().unwrap();
        assert_eq!(result.faces.len(), 8);
        assert!(outcome.uncombined.is_empty());
        assert!(outcome.incombinable.is_empty());
        assert!(outcome.is_successful);
        // Both the within-group union and the (trivial, single-group) final
        // combine step memoize their outcome.
        assert!(cache.contains_key("+a+b!"));
    }

    #[test]
    fn combine_multiple_meshes_subtracts_inversion_group() {
        let combiner = NaiveMeshCombiner;
        let recombiner = DefaultRecombiner;
        let mut cache = CombinationCache::new();
        let inputs = vec![
            CombineInput { component_id: "a".into(), mode: CombineMode::Normal, mesh: Some(tetrahedron_mesh(Vec3::zeros())) },
            CombineInput { component_id: "b".into(), mode: CombineMode::Inversion, mesh: Some(tetrahedron_mesh(Vec3::zeros())) },
        ];
        let outcome = combine_multiple_meshes(&combiner, &recombiner, &mut cache, &inputs);
        assert!(outcome.mesh.is_none());
        // A null CSG result marks the whole outcome unsuccessful.
        assert!(!outcome.is_successful);
        // The null result is memoized too, under the inversion-sign key.
        assert!(cache.contains_key("+a-b!"));
    }

    #[test]
    fn repeated_combination_reuses_the_cached_result() {
        let combiner = NaiveMeshCombiner;
        let recombiner = DefaultRecombiner;
        let mut cache = CombinationCache::new();
        let inputs = vec![
            CombineInput { component_id: "a".into(), mode: CombineMode::Normal, mesh: Some(tetrahedron_mesh(Vec3::zeros())) },
            CombineInput { component_id: "b".into(), mode: CombineMode::Normal, mesh: Some(tetrahedron_mesh(Vec3::new(10.0, 10.0, 10.0))) },
        ];
        let first = combine_multiple_meshes(&combiner, &recombiner, &mut cache, &inputs).mesh.unwrap();
        let cache_size_after_first = cache.len();

        let second = combine_multiple_meshes(&combiner, &recombiner, &mut cache, &inputs).mesh.unwrap();
        assert_eq!(cache.len(), cache_size_after_first);
        assert_eq!(first.faces.len(), second.faces.len());
    }

    #[test]
    fn uncombined_child_bypasses_csg_and_is_kept_separate() {
        let combiner = NaiveMeshCombiner;
        let recombiner = DefaultRecombiner;
        let mut cache = CombinationCache::new();
        let inputs = vec![
            CombineInput { component_id: "a".into(), mode: CombineMode::Normal, mesh: Some(tetrahedron_mesh(Vec3::zeros())) },
            CombineInput { component_id: "b".into(), mode: CombineMode::Uncombined, mesh: Some(tetrahedron_mesh(Vec3::new(20.0, 0.0, 0.0))) },
        ];
        let outcome = combine_multiple_meshes(&combiner, &recombiner, &mut cache, &inputs);
        assert_eq!(outcome.mesh.unwrap().faces.len(), 4);
        assert_eq!(outcome.uncombined.len(), 1);
        assert!(outcome.incombinable.is_empty());
    }

    #[test]
    fn non_combinable_child_is_routed_to_incombinable_not_unioned() {
        let combiner = NaiveMeshCombiner;
        let recombiner = DefaultRecombiner;
        let mut cache = CombinationCache::new();
        let inputs = vec![
            CombineInput { component_id: "a".into(), mode: CombineMode::Normal, mesh: Some(tetrahedron_mesh(Vec3::zeros())) },
            CombineInput { component_id: "b".into(), mode: CombineMode::Normal, mesh: Some(open_triangle_mesh(Vec3::new(20.0, 0.0, 0.0))) },
        ];
        let outcome = combine_multiple_meshes(&combiner, &recombiner, &mut cache, &inputs);
        assert_eq!(outcome.mesh.unwrap().faces.len(), 4);
        assert!(outcome.uncombined.is_empty());
        assert_eq!(outcome.incombinable.len(), 1);
    }
}
