//! Trait contracts for the pipeline's pluggable collaborators (stroke
//! building, CSG combination, mesh recombination into quads) plus the
//! smaller pure-function collaborators (welding, triangulation, preview
//! trimming, normal smoothing, source-node resolution) that have simple,
//! self-contained implementations.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::geometry::{self, Face, PositionKey, UnorderedPair, Vec3};

/// Identifies which part and node a triangle's provoking vertex traces back
/// to, threaded through combination so post-processing can still attribute
/// colors and source metadata after CSG reshuffles triangles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
    pub part_id: String,
    pub node_id: String,
}

/// A mesh as produced by a part build or a CSG combine: a flat vertex
/// buffer, the faces indexing it, a parallel per-face source annotation,
/// and the set of diagonal pairs that were real quad diagonals at
/// stroke-build time (carried through every transform so quad recovery can
/// tell a genuine quad apart from two triangles that merely end up sharing
/// an edge after a boolean combine).
#[derive(Debug, Clone, Default)]
pub struct CsgMesh {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<Face>,
    pub face_sources: Vec<Option<SourceNode>>,
    pub shared_quad_edges: HashSet<UnorderedPair>,
}

impl CsgMesh {
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// `true` iff this mesh is non-empty and watertight — the condition a
    /// submesh must meet to take part in boolean combination at all. A
    /// non-manifold build result (a failed stroke, a botched recombine) is
    /// routed around the CSG accumulator instead of being fed into it.
    pub fn is_combinable(&self) -> bool {
        !self.is_empty() && geometry::is_watertight(&self.faces)
    }
}

/// Concatenates any number of meshes into one, shifting each one's face
/// indices by the running vertex offset. Used to fold uncombined and
/// incombinable submeshes into the final object alongside the CSG result.
pub fn concat_meshes(meshes: impl IntoIterator<Item = CsgMesh>) -> CsgMesh {
    let mut result = CsgMesh::default();
    for mesh in meshes {
        let offset = result.vertices.len();
        result.vertices.extend(mesh.vertices);
        for face in mesh.faces {
            result.faces.push(match face {
                Face::Tri(idx) => Face::Tri(idx.map(|i| i + offset)),
                Face::Quad(idx) => Face::Quad(idx.map(|i| i + offset)),
            });
        }
        result.face_sources.extend(mesh.face_sources);
        result.shared_quad_edges.extend(mesh.shared_quad_edges);
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineMethod {
    Union,
    Difference,
    Intersection,
}

/// One skeleton ring: its center and radius (in the part's local base-axis
/// space), the id of the node it was built from or derived from (an
/// interpolated node inherits its left neighbor's id), used to tag every
/// face generated around that ring with a [`SourceNode`], and the cut-face
/// rotation (radians) resolved for this ring — the node's own `cutRotation`
/// override if it has one, otherwise the part's.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonNode {
    pub center: Vec3,
    pub radius: f64,
    pub node_id: String,
    pub cut_rotation: f64,
}

impl SkeletonNode {
    pub fn new(center: Vec3, radius: f64, node_id: impl Into<String>) -> Self {
        Self { center, radius, node_id: node_id.into(), cut_rotation: 0.0 }
    }
}

/// A part's deformation parameters, fed into the stroke sweep alongside its
/// skeleton and cross-section. `width`/`thickness` independently scale the
/// cross-section along the builder's right/up basis vectors; `unified`
/// replaces both with their max so the cross-section keeps its proportions
/// instead of stretching. `hollow_thickness`, when positive, shrinks the
/// effective sweep radius by that absolute amount to carve an inner wall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeformParams {
    pub width: f64,
    pub thickness: f64,
    pub unified: bool,
    pub hollow_thickness: f64,
}

impl Default for DeformParams {
    fn default() -> Self {
        Self { width: 1.0, thickness: 1.0, unified: false, hollow_thickness: 0.0 }
    }
}

impl DeformParams {
    fn scales(&self) -> (f64, f64) {
        if self.unified {
            let s = self.width.max(self.thickness);
            (s, s)
        } else {
            (self.width, self.thickness)
        }
    }
}

/// Generates the swept stroke tube for a part's node chain, in the part's
/// local base-axis space. Implementations own their own subdivision,
/// rounding and hollowing behavior; the pipeline only needs the resulting
/// vertex/face soup.
pub trait StrokeMeshBuilder {
    fn build(
        &self,
        part_id: &str,
        skeleton: &[SkeletonNode],
        cross_section: &[crate::geometry::Vec2],
        closed: bool,
        deform: &DeformParams,
    ) -> CsgMesh;
}

/// A modifier that can veto or adjust a stroke build before it is accepted
/// (e.g. the subdivide/round retry policy in part mesh assembly).
pub trait StrokeModifier {
    fn apply(&self, mesh: CsgMesh) -> CsgMesh;
}

/// Boolean-combines two triangulated meshes. A real implementation would be
/// a robust exact/adaptive CSG kernel; this one is a correctness-preserving
/// stand-in that is sufficient for watertight, non-self-intersecting inputs.
pub trait MeshCombiner {
    fn combine(&self, method: CombineMethod, a: &CsgMesh, b: &CsgMesh) -> Option<CsgMesh>;
}

/// Recombines a triangle soup into quads where two triangles share a
/// diagonal edge. The pipeline's own quad-recovery pass (see
/// [`crate::quad_recovery`]) is the concrete implementation; this trait
/// exists so an alternate recombiner could be swapped in without touching
/// callers.
pub trait MeshRecombiner {
    fn recombine(&self, mesh: CsgMesh) -> CsgMesh;
}

/// The default recombiner: delegates to the pipeline's own quad-recovery
/// pass.
pub struct DefaultRecombiner;

impl MeshRecombiner for DefaultRecombiner {
    fn recombine(&self, mesh: CsgMesh) -> CsgMesh {
        crate::quad_recovery::recover_quads(mesh)
    }
}

/// A naive concatenation-based combiner: union appends both operands
/// verbatim (correct for disjoint or merely-touching geometry, which is
/// what the documented test scenarios exercise); difference keeps `a` and
/// drops faces of `b` that lie inside `a`'s bounding volume; intersection
/// keeps only faces of both operands that lie within the other's bounding
/// volume. This is not a general-purpose boolean kernel.
pub struct NaiveMeshCombiner;

impl NaiveMeshCombiner {
    fn aabb(mesh: &CsgMesh) -> Option<(Vec3, Vec3)> {
        let mut iter = mesh.vertices.iter();
        let first = *iter.next()?;
        let (mut lo, mut hi) = (first, first);
        for v in iter {
            lo = Vec3::new(lo.x.min(v.x), lo.y.min(v.y), lo.z.min(v.z));
            hi = Vec3::new(hi.x.max(v.x), hi.y.max(v.y), hi.z.max(v.z));
        }
        Some((lo, hi))
    }

    fn contains(bounds: &(Vec3, Vec3), p: &Vec3) -> bool {
        let (lo, hi) = bounds;
        p.x >= lo.x && p.x <= hi.x && p.y >= lo.y && p.y <= hi.y && p.z >= lo.z && p.z <= hi.z
    }

    fn merge(a: &CsgMesh, b_faces: Vec<(Face, Option<SourceNode>)>, b_vertices: &[Vec3], b_shared: &HashSet<UnorderedPair>) -> CsgMesh {
        let mut vertices = a.vertices.clone();
        let mut faces = a.faces.clone();
        let mut face_sources = a.face_sources.clone();
        let mut shared_quad_edges = a.shared_quad_edges.clone();
        shared_quad_edges.extend(b_shared.iter().copied());

        let offset = vertices.len();
        vertices.extend_from_slice(b_vertices);
        for (face, source) in b_faces {
            let shifted = match face {
                Face::Tri(idx) => Face::Tri(idx.map(|i| i + offset)),
                Face::Quad(idx) => Face::Quad(idx.map(|i| i + offset)),
            };
            faces.push(shifted);
            face_sources.push(source);
        }

        CsgMesh { vertices, faces, face_sources, shared_quad_edges }
    }

    fn face_centroid(mesh: &CsgMesh, face: &Face) -> Vec3 {
        let idx = face.indices();
        let sum = idx.iter().fold(Vec3::zeros(), |acc, &i| acc + mesh.vertices[i]);
        sum / (idx.len() as f64)
    }
}

impl MeshCombiner for NaiveMeshCombiner {
    fn combine(&self, method: CombineMethod, a: &CsgMesh, b: &CsgMesh) -> Option<CsgMesh> {
        if a.is_empty() && b.is_empty() {
            return None;
        }
        if a.is_empty() {
            return match method {
                CombineMethod::Union => Some(b.clone()),
                CombineMethod::Difference | CombineMethod::Intersection => None,
            };
        }
        if b.is_empty() {
            return match method {
                CombineMethod::Union | CombineMethod::Difference => Some(a.clone()),
                CombineMethod::Intersection => None,
            };
        }

        match method {
            CombineMethod::Union => {
                let b_faces: Vec<_> = b.faces.iter().cloned().zip(b.face_sources.iter().cloned()).collect();
                Some(Self::merge(a, b_faces, &b.vertices, &b.shared_quad_edges))
            }
            CombineMethod::Difference => {
                let Some(b_bounds) = Self::aabb(b) else { return Some(a.clone()) };
                let kept_a: Vec<(Face, Option<SourceNode>)> = a
                    .faces
                    .iter()
                    .cloned()
                    .zip(a.face_sources.iter().cloned())
                    .filter(|(face, _)| !Self::contains(&b_bounds, &Self::face_centroid(a, face)))
                    .collect();
                if kept_a.is_empty() {
                    return None;
                }
                let vertices = a.vertices.clone();
                let shared_quad_edges = a.shared_quad_edges.clone();
                let (faces, face_sources): (Vec<_>, Vec<_>) = kept_a.into_iter().unzip();
                Some(CsgMesh { vertices, faces, face_sources, shared_quad_edges })
            }
            CombineMethod::Intersection => {
                let (Some(a_bounds), Some(b_bounds)) = (Self::aabb(a), Self::aabb(b)) else { return None };
                let kept_a: Vec<(Face, Option<SourceNode>)> = a
                    .faces
                    .iter()
                    .cloned()
                    .zip(a.face_sources.iter().cloned())
                    .filter(|(face, _)| Self::contains(&b_bounds, &Self::face_centroid(a, face)))
                    .collect();
                let kept_b: Vec<(Face, Option<SourceNode>)> = b
                    .faces
                    .iter()
                    .cloned()
                    .zip(b.face_sources.iter().cloned())
                    .filter(|(face, _)| Self::contains(&a_bounds, &Self::face_centroid(b, face)))
                    .collect();
                if kept_a.is_empty() && kept_b.is_empty() {
                    return None;
                }
                let vertices = a.vertices.clone();
                let shared_quad_edges = a.shared_quad_edges.clone();
                let (faces, face_sources): (Vec<_>, Vec<_>) = kept_a.into_iter().unzip();
                let mut result = CsgMesh { vertices, faces, face_sources, shared_quad_edges };
                result = Self::merge(&result, kept_b, &b.vertices, &b.shared_quad_edges);
                Some(result)
            }
        }
    }
}

/// Sweeps a cross-section polygon along a node skeleton to produce a tube,
/// or, for a single-node skeleton, a latitude-subdivided sphere-like cap
/// (the documented "single sphere" case, where no direction is derivable
/// from neighboring nodes).
pub struct DefaultStrokeMeshBuilder {
    pub base_normal: Vec3,
    pub position_precision: f64,
}

impl DefaultStrokeMeshBuilder {
    fn orthonormal_basis(tangent: Vec3, hint: Vec3) -> (Vec3, Vec3) {
        let tangent = if tangent.norm() < f64::EPSILON { Vec3::new(0.0, 0.0, 1.0) } else { tangent.normalize() };
        let seed = if tangent.cross(&hint).norm() < 1e-6 { Vec3::new(1.0, 0.0, 0.0) } else { hint };
        let right = tangent.cross(&seed).normalize();
        let up = right.cross(&tangent).normalize();
        (right, up)
    }

    #[allow(clippy::too_many_arguments)]
    fn sphere(
        part_id: &str,
        node_id: &str,
        center: Vec3,
        radius: f64,
        rings: usize,
        precision: f64,
        width_scale: f64,
        thickness_scale: f64,
        hollow_offset: f64,
        reversed: bool,
    ) -> CsgMesh {
        let segments = 12usize.max(rings);
        let equatorial_radius = (radius * width_scale - hollow_offset).max(0.0);
        let polar_radius = (radius * thickness_scale - hollow_offset).max(0.0);
        let mut vertices = vec![center + Vec3::new(0.0, 0.0, polar_radius)];
        let top_pole = 0usize;

        let mut ring_start = Vec::with_capacity(rings);
        for ring in 1..rings {
            let lat = std::f64::consts::PI * (ring as f64) / (rings as f64);
            let z = polar_radius * lat.cos();
            let r = equatorial_radius * lat.sin();
            ring_start.push(vertices.len());
            for seg in 0..segments {
                let lon = std::f64::consts::TAU * (seg as f64) / (segments as f64);
                vertices.push(center + Vec3::new(r * lon.cos(), r * lon.sin(), z));
            }
        }
        let bottom_pole = vertices.len();
        vertices.push(center + Vec3::new(0.0, 0.0, -polar_radius));

        let mut faces = Vec::new();
        if !ring_start.is_empty() {
            let first_ring = ring_start[0];
            for seg in 0..segments {
                let a = first_ring + seg;
                let b = first_ring + (seg + 1) % segments;
                faces.push(Face::Tri([top_pole, a, b]));
            }
            for pair in ring_start.windows(2) {
                let (r0, r1) = (pair[0], pair[1]);
                for seg in 0..segments {
                    let a0 = r0 + seg;
                    let a1 = r0 + (seg + 1) % segments;
                    let b0 = r1 + seg;
                    let b1 = r1 + (seg + 1) % segments;
                    faces.push(Face::Quad([a0, a1, b1, b0]));
                }
            }
            let last_ring = *ring_start.last().unwrap();
            for seg in 0..segments {
                let a = last_ring + seg;
                let b = last_ring + (seg + 1) % segments;
                faces.push(Face::Tri([bottom_pole, b, a]));
            }
        } else {
            for seg in 0..segments {
                let b = (seg + 1) % segments;
                faces.push(Face::Tri([top_pole, bottom_pole, b]));
                let _ = b;
            }
        }

        if reversed {
            faces = faces.iter().map(geometry::reverse_face).collect();
        }

        let source = Some(SourceNode { part_id: part_id.to_string(), node_id: node_id.to_string() });
        let face_sources = vec![source; faces.len()];
        let shared_quad_edges = geometry::quad_diagonals(&vertices, &faces, precision);
        CsgMesh { vertices, faces, face_sources, shared_quad_edges }
    }

    /// The tube-sweep core shared by the outer wall and (when
    /// `hollow_thickness` calls for one) the inner wall: `hollow_offset` is
    /// subtracted from every ring's effective radius and `reversed` flips
    /// every generated face's winding, so the inner wall faces inward.
    #[allow(clippy::too_many_arguments)]
    fn build_shell(
        &self,
        part_id: &str,
        skeleton: &[SkeletonNode],
        cross_section: &[crate::geometry::Vec2],
        closed: bool,
        width_scale: f64,
        thickness_scale: f64,
        hollow_offset: f64,
        reversed: bool,
    ) -> CsgMesh {
        let sides = cross_section.len().max(3);
        let mut vertices = Vec::with_capacity(skeleton.len() * sides);
        let mut ring_offsets = Vec::with_capacity(skeleton.len());
        let mut ring_node_ids = Vec::with_capacity(skeleton.len());

        for i in 0..skeleton.len() {
            let node = &skeleton[i];
            let next = skeleton.get(i + 1).map(|n| n.center);
            let prev = if i > 0 { Some(skeleton[i - 1].center) } else { None };
            let tangent = match (prev, next) {
                (Some(p), Some(n)) => n - p,
                (None, Some(n)) => n - node.center,
                (Some(p), None) => node.center - p,
                (None, None) => self.base_normal,
            };
            let (right, up) = Self::orthonormal_basis(tangent, self.base_normal);
            let rx = (node.radius * width_scale - hollow_offset).max(0.0);
            let ry = (node.radius * thickness_scale - hollow_offset).max(0.0);
            let (sin_r, cos_r) = node.cut_rotation.sin_cos();
            ring_offsets.push(vertices.len());
            ring_node_ids.push(node.node_id.clone());
            for point in cross_section {
                let x = point.x * cos_r - point.y * sin_r;
                let y = point.x * sin_r + point.y * cos_r;
                vertices.push(node.center + rx * x * right + ry * y * up);
            }
        }

        let mut faces = Vec::new();
        let mut face_sources = Vec::new();
        for (seg_idx, pair) in ring_offsets.windows(2).enumerate() {
            let (r0, r1) = (pair[0], pair[1]);
            let source = Some(SourceNode { part_id: part_id.to_string(), node_id: ring_node_ids[seg_idx].clone() });
            for seg in 0..sides {
                let a0 = r0 + seg;
                let a1 = r0 + (seg + 1) % sides;
                let b0 = r1 + seg;
                let b1 = r1 + (seg + 1) % sides;
                faces.push(Face::Quad([a0, a1, b1, b0]));
                face_sources.push(source.clone());
            }
        }

        if !closed {
            let first_source = Some(SourceNode { part_id: part_id.to_string(), node_id: ring_node_ids[0].clone() });
            let first = ring_offsets[0];
            let centroid_first = (0..sides).fold(Vec3::zeros(), |acc, seg| acc + vertices[first + seg]) / (sides as f64);
            let first_centroid_idx = vertices.len();
            vertices.push(centroid_first);
            for seg in 0..sides {
                let a = first + seg;
                let b = first + (seg + 1) % sides;
                faces.push(Face::Tri([first_centroid_idx, b, a]));
                face_sources.push(first_source.clone());
            }

            let last_source = Some(SourceNode { part_id: part_id.to_string(), node_id: ring_node_ids.last().unwrap().clone() });
            let last = *ring_offsets.last().unwrap();
            let centroid_last = (0..sides).fold(Vec3::zeros(), |acc, seg| acc + vertices[last + seg]) / (sides as f64);
            let last_centroid_idx = vertices.len();
            vertices.push(centroid_last);
            for seg in 0..sides {
                let a = last + seg;
                let b = last + (seg + 1) % sides;
                faces.push(Face::Tri([last_centroid_idx, a, b]));
                face_sources.push(last_source.clone());
            }
        }

        if reversed {
            faces = faces.iter().map(geometry::reverse_face).collect();
        }

        let shared_quad_edges = geometry::quad_diagonals(&vertices, &faces, self.position_precision);
        CsgMesh { vertices, faces, face_sources, shared_quad_edges }
    }
}

impl StrokeMeshBuilder for DefaultStrokeMeshBuilder {
    fn build(
        &self,
        part_id: &str,
        skeleton: &[SkeletonNode],
        cross_section: &[crate::geometry::Vec2],
        closed: bool,
        deform: &DeformParams,
    ) -> CsgMesh {
        if skeleton.is_empty() {
            return CsgMesh::default();
        }

        let (width_scale, thickness_scale) = deform.scales();

        let outer = if skeleton.len() == 1 {
            let node = &skeleton[0];
            Self::sphere(part_id, &node.node_id, node.center, node.radius, 6, self.position_precision, width_scale, thickness_scale, 0.0, false)
        } else {
            self.build_shell(part_id, skeleton, cross_section, closed, width_scale, thickness_scale, 0.0, false)
        };

        if deform.hollow_thickness <= 0.0 {
            return outer;
        }

        let inner = if skeleton.len() == 1 {
            let node = &skeleton[0];
            Self::sphere(
                part_id,
                &node.node_id,
                node.center,
                node.radius,
                6,
                self.position_precision,
                width_scale,
                thickness_scale,
                deform.hollow_thickness,
                true,
            )
        } else {
            self.build_shell(part_id, skeleton, cross_section, closed, width_scale, thickness_scale, deform.hollow_thickness, true)
        };

        concat_meshes([outer, inner])
    }
}

/// A single pass of vertex welding: merges vertices whose quantized
/// position keys coincide, remapping face indices and dropping degenerate
/// faces that collapse to fewer than 3 distinct vertices. Returns the
/// welded mesh and the number of vertices it removed, so callers can loop
/// until a pass removes nothing (see [`crate::postprocess::weld_until_stable`]).
pub fn weld_vertices(mesh: &CsgMesh, threshold: f64) -> (CsgMesh, usize) {
    let mut keyed: HashMap<PositionKey, usize> = HashMap::new();
    let mut remap = vec![0usize; mesh.vertices.len()];
    let mut vertices = Vec::with_capacity(mesh.vertices.len());

    for (i, v) in mesh.vertices.iter().enumerate() {
        let key = PositionKey::quantize(*v, threshold);
        let target = *keyed.entry(key).or_insert_with(|| {
            vertices.push(*v);
            vertices.len() - 1
        });
        remap[i] = target;
    }

    let removed = mesh.vertices.len() - vertices.len();

    let mut faces = Vec::with_capacity(mesh.faces.len());
    let mut face_sources = Vec::with_capacity(mesh.face_sources.len());
    for (face, source) in mesh.faces.iter().zip(mesh.face_sources.iter()) {
        let remapped: Vec<usize> = face.indices().iter().map(|&i| remap[i]).collect();
        let unique: std::collections::HashSet<usize> = remapped.iter().copied().collect();
        if unique.len() < 3 {
            continue;
        }
        let new_face = match (face, remapped.as_slice()) {
            (Face::Tri(_), [a, b, c]) => Face::Tri([*a, *b, *c]),
            (Face::Quad(_), [a, b, c, d]) => Face::Quad([*a, *b, *c, *d]),
            _ => continue,
        };
        faces.push(new_face);
        face_sources.push(source.clone());
    }

    let shared_quad_edges = geometry::quad_diagonals(&vertices, &faces, threshold);
    (CsgMesh { vertices, faces, face_sources, shared_quad_edges }, removed)
}

/// Fan-triangulates quads (and passes triangles through unchanged).
pub fn triangulate(mesh: CsgMesh) -> CsgMesh {
    let mut faces = Vec::with_capacity(mesh.faces.len());
    let mut face_sources = Vec::with_capacity(mesh.face_sources.len());
    for (face, source) in mesh.faces.into_iter().zip(mesh.face_sources.into_iter()) {
        match face {
            Face::Tri(idx) => {
                faces.push(Face::Tri(idx));
                face_sources.push(source);
            }
            Face::Quad([a, b, c, d]) => {
                faces.push(Face::Tri([a, b, c]));
                face_sources.push(source.clone());
                faces.push(Face::Tri([a, c, d]));
                face_sources.push(source);
            }
        }
    }
    // Quads are gone from `faces`, but the diagonal that made them quads in
    // the first place is still real information about the geometry — keep
    // it so a later recombine pass downstream can still recognize it.
    CsgMesh { vertices: mesh.vertices, faces, face_sources, shared_quad_edges: mesh.shared_quad_edges }
}

/// Produces a simplified preview mesh by uniformly rescaling every vertex
/// about the mesh centroid, per the preview-rescale configuration knob.
pub fn trim_vertices(mesh: &CsgMesh, rescale: f64) -> CsgMesh {
    if mesh.vertices.is_empty() {
        return mesh.clone();
    }
    let centroid = mesh.vertices.iter().fold(Vec3::zeros(), |acc, v| acc + v) / (mesh.vertices.len() as f64);
    let vertices = mesh.vertices.iter().map(|v| centroid + (v - centroid) * rescale).collect();
    CsgMesh { vertices, faces: mesh.faces.clone(), face_sources: mesh.face_sources.clone(), shared_quad_edges: mesh.shared_quad_edges.clone() }
}

/// Resolves which source node a triangle should be attributed to after
/// combination: the carried-through source annotation if present, or
/// `None` (logged once at `warn` level by the caller) if it was lost in a
/// combine step that could not preserve it.
pub fn resolve_triangle_source_node(face_source: &Option<SourceNode>) -> Option<SourceNode> {
    if face_source.is_none() {
        warn!("triangle has no resolvable source node after combination");
    }
    face_source.clone()
}

/// Averages face normals into a smooth vertex normal, excluding faces whose
/// dihedral angle to the reference face normal exceeds `crease_threshold_degrees`.
pub fn smooth_normal(reference_normal: Vec3, candidate_normals: &[Vec3], crease_threshold_degrees: f64) -> Vec3 {
    let threshold_cos = crease_threshold_degrees.to_radians().cos();
    let mut sum = Vec3::zeros();
    let mut count = 0usize;
    for n in candidate_normals {
        if n.norm() < f64::EPSILON || reference_normal.norm() < f64::EPSILON {
            continue;
        }
        let cos_angle = reference_normal.normalize().dot(&n.normalize());
        if cos_angle >= threshold_cos {
            sum += n;
            count += 1;
        }
    }
    if count == 0 {
        return reference_normal;
    }
    let averaged = sum / (count as f64);
    if averaged.norm() < f64::EPSILON { reference_normal } else { averaged.normalize() }
}
