//! Procedural polygonal mesh generation over a snapshot-indexed scene
//! tree: nodes and edges describe a skeleton per part, parts are swept
//! into stroke meshes, components combine their children's meshes through
//! grouped CSG boolean operations, and the combined triangle soup is
//! recovered back into quads, welded and shaded.
//!
//! Regeneration is incremental: [`dirty::compute_dirty_sets`] computes which
//! parts and components changed since the last snapshot, and [`Generator`]
//! only rebuilds what the dirty closure touches.

pub mod attrs;
pub mod cache;
pub mod collaborators;
pub mod combine;
pub mod config;
pub mod cutface;
pub mod dirty;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod ids;
pub mod mirror;
pub mod part_mesh;
pub mod postprocess;
pub mod quad_recovery;
pub mod snapshot;

pub use config::GenerationConfig;
pub use error::MeshGenError;
pub use generator::{Generator, Object};
pub use snapshot::Snapshot;
