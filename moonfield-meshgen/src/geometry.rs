//! Vector aliases and the quantized position-key used to make coincident
//! floating point vertices compare and hash equal across the pipeline.

use std::collections::{HashMap, HashSet};

use moonfield_math::{Vec2d, Vec3d};

pub type Vec2 = Vec2d;
pub type Vec3 = Vec3d;

/// A face with either 3 or 4 vertex indices into a shared vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Face {
    Tri([usize; 3]),
    Quad([usize; 4]),
}

impl Face {
    pub fn indices(&self) -> &[usize] {
        match self {
            Face::Tri(v) => v,
            Face::Quad(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        self.indices().len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Quantized representation of a 3D point, used so coincident vertices hash
/// and compare equal despite floating point noise. Two points within half a
/// `precision` unit of each other on every axis round to the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey(pub i64, pub i64, pub i64);

impl PositionKey {
    pub fn quantize(p: Vec3, precision: f64) -> Self {
        let inv = 1.0 / precision;
        Self(
            (p.x * inv).round() as i64,
            (p.y * inv).round() as i64,
            (p.z * inv).round() as i64,
        )
    }
}

/// An unordered diagonal pair, used to key `sharedQuadEdges`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnorderedPair(pub PositionKey, pub PositionKey);

impl UnorderedPair {
    pub fn new(a: PositionKey, b: PositionKey) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }
}

/// Default quantization precision for the pipeline's internal position-key
/// bookkeeping (quad-diagonal recording, quad recovery). Matches
/// `GenerationConfig::default().position_key_precision`.
pub const DEFAULT_POSITION_PRECISION: f64 = 1e-4;

/// The diagonal pairs of every quad face in `faces` (vertex0↔vertex2 and
/// vertex1↔vertex3), quantized by position key. Recorded once at stroke-build
/// time, before CSG triangulates quads away, so a later recombine pass can
/// tell a genuine original quad diagonal apart from two triangles that merely
/// happen to share an edge after boolean combination.
pub fn quad_diagonals(vertices: &[Vec3], faces: &[Face], precision: f64) -> HashSet<UnorderedPair> {
    let mut set = HashSet::new();
    for face in faces {
        if let Face::Quad([a, b, c, d]) = face {
            set.insert(UnorderedPair::new(PositionKey::quantize(vertices[*a], precision), PositionKey::quantize(vertices[*c], precision)));
            set.insert(UnorderedPair::new(PositionKey::quantize(vertices[*b], precision), PositionKey::quantize(vertices[*d], precision)));
        }
    }
    set
}

/// Reverses a face's winding order (flips which side its normal faces)
/// without touching vertex positions. Used both by mirror reflection (which
/// must flip orientation alongside the x-negation) and by hollow-shell
/// generation (whose inner wall faces the opposite way from the outer one).
pub fn reverse_face(face: &Face) -> Face {
    match face {
        Face::Tri([a, b, c]) => Face::Tri([*a, *c, *b]),
        Face::Quad([a, b, c, d]) => Face::Quad([*a, *d, *c, *b]),
    }
}

/// `true` iff every directed half-edge `(a, b)` of every face has a unique
/// matching opposite half-edge `(b, a)` somewhere else in the mesh, and no
/// directed half-edge occurs more than once. A single-sided hole, a
/// non-manifold seam with three or more faces sharing an edge, or a flipped
/// face that leaves two half-edges pointing the same direction all fail
/// this check.
pub fn is_watertight(faces: &[Face]) -> bool {
    let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
    for face in faces {
        let idx = face.indices();
        for i in 0..idx.len() {
            let a = idx[i];
            let b = idx[(i + 1) % idx.len()];
            *directed.entry((a, b)).or_insert(0) += 1;
        }
    }
    if directed.values().any(|&count| count != 1) {
        return false;
    }
    directed.keys().all(|&(a, b)| directed.contains_key(&(b, a)))
}
