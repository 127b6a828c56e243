//! Generation-wide tunables that are not authored per-part/per-component
//! snapshot attributes. Constructed once and threaded through a `Generator`,
//! the way `moonfield_core::logging::LoggingConfig` centralizes engine-wide
//! tunables instead of scattering literals through call sites.

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Distance threshold (world units) under which two vertices are welded
    /// together during post-processing.
    pub weld_threshold: f64,
    /// Crease threshold, in degrees, above which adjacent faces are treated
    /// as a hard edge rather than smoothed when generating vertex normals.
    pub smooth_shading_threshold_angle_degrees: f64,
    /// Quantization precision used to build `PositionKey`s.
    pub position_key_precision: f64,
    /// Scale factor applied to trimmed preview vertices.
    pub preview_rescale: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            weld_threshold: 0.025,
            smooth_shading_threshold_angle_degrees: 60.0,
            position_key_precision: 1e-4,
            preview_rescale: 2.0,
        }
    }
}
