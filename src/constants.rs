//! Centralized numeric contract for the destruction core.
//!
//! These values are tuning-sensitive: material thresholds across the preset
//! catalog were calibrated against them. Changing any of them re-tunes every
//! material, so they live here rather than scattered across modules.

// =====================================================
// Load propagation
// =====================================================

/// Relaxation passes over load-bearing edges per `calculate_loads` call.
pub const LOAD_PROPAGATION_PASSES: u32 = 5;

/// Fraction of a vertex load transferred along each edge per pass.
/// Directional and non-conservative: transferred load is not subtracted
/// from the source. Contractual behavior, not a bug to fix.
pub const LOAD_TRANSFER_RATIO: f32 = 0.5;

// =====================================================
// Impact stress model
// =====================================================

/// Assumed projectile penetration depth (m) when converting energy to force.
pub const IMPACT_PENETRATION_DEPTH_M: f32 = 0.1;

/// Assumed impact contact area (m^2), roughly a bullet cross-section.
pub const IMPACT_AREA_M2: f32 = 0.001;

/// Impulse duration (s) assumed when an impact event carries none.
pub const DEFAULT_IMPULSE_DURATION_S: f32 = 0.01;

/// Kinetic energy (J) that maps to the preset's maximum piece count.
pub const REFERENCE_FRACTURE_ENERGY_J: f32 = 1000.0;

// =====================================================
// Crack propagation
// =====================================================

/// Stress-intensity ratio (von Mises / max stress) above which a fractured
/// brittle vertex spreads stress to its edge neighbors.
pub const CRACK_PROPAGATION_THRESHOLD: f32 = 0.5;

/// Fraction of the origin's von Mises stress added to each neighbor.
pub const CRACK_STRESS_TRANSFER: f32 = 0.3;

// =====================================================
// Seed sampling (Bridson Poisson disk)
// =====================================================

/// Candidate attempts per active sample before it is retired.
pub const POISSON_CANDIDATE_ATTEMPTS: u32 = 30;

/// Lower clamp on the stress-guided fragment size gradient.
pub const SIZE_GRADIENT_MIN: f32 = 0.2;

/// Upper clamp on the stress-guided fragment size gradient.
pub const SIZE_GRADIENT_MAX: f32 = 2.0;

/// Candidate shell stretch factor along the grain direction.
pub const GRAIN_SHELL_STRETCH: f32 = 0.5;

// =====================================================
// Fragment physics
// =====================================================

/// Density (kg/m^3) used for fragment mass from AABB volume.
pub const FRAGMENT_DENSITY_KG_M3: f32 = 1000.0;

/// Floor on fragment mass (kg) so tiny cells stay integrable.
pub const MIN_FRAGMENT_MASS_KG: f32 = 0.1;

/// Floor on the distance-from-impact divisor in the velocity magnitude.
pub const MIN_IMPACT_DISTANCE_M: f32 = 0.5;

/// Angular speed as a fraction of linear speed for fragment tumbling.
pub const TUMBLE_FACTOR: f32 = 0.5;

/// Explosion fragments eject faster than the base magnitude.
pub const EXPLOSION_SPEED_MULT: f32 = 1.5;

/// Cutting impacts impart less ejection energy.
pub const CUTTING_SPEED_MULT: f32 = 0.7;

/// Crushing impacts suppress the vertical velocity component.
pub const CRUSHING_VERTICAL_DAMP: f32 = 0.3;

// =====================================================
// Geometry
// =====================================================

/// Keep-side tolerance when clipping cell polytopes by bisector half-spaces.
pub const HALF_SPACE_TOLERANCE: f32 = 1e-6;

/// Generic epsilon for degenerate-geometry guards (zero-length vectors,
/// parallel rays).
pub const GEOM_EPSILON: f32 = 1e-6;

/// Voxel approximation grid dimension (fixed 4x4x4 = 64 cells).
pub const VOXEL_GRID_DIM: usize = 4;
