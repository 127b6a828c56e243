use thiserror::Error;

/// Errors for conditions that are structurally impossible rather than
/// data-in-progress. The documented pipeline failure taxonomy (build
/// failure, null CSG, non-combinable submesh, missing referenced entity)
/// is intentionally *not* represented here — those are data-valued outcomes
/// carried on the cache entries themselves, per the error handling design.
#[derive(Debug, Error)]
pub enum MeshGenError {
    #[error("component {0} is neither a part leaf (linkDataType=\"partId\") nor has children")]
    MalformedComponent(String),
}
