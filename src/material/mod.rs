//! Structural materials and fracture-behavior presets.
//!
//! Two distinct notions live here:
//! - [`StructuralMaterial`]: strength thresholds (Pa) the stress analyzer
//!   tests loads against.
//! - [`FractureProperties`]: how a mesh *breaks* once it fails - piece counts,
//!   pattern strengths, grain direction.
//!
//! Presets are data, not types. Unknown preset names degrade to stone.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Strength thresholds for a structural material.
///
/// Invariant: `yield_strength_pa <= tensile_strength_pa` and
/// `compressive_strength_pa <= max_stress_pa`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructuralMaterial {
    pub density_kg_m3: f32,
    pub tensile_strength_pa: f32,
    pub compressive_strength_pa: f32,
    pub yield_strength_pa: f32,
    pub max_stress_pa: f32,
    /// Brittle materials propagate cracks to neighbors; ductile ones deform.
    pub brittle: bool,
}

impl StructuralMaterial {
    pub fn concrete() -> Self {
        Self {
            density_kg_m3: 2400.0,
            tensile_strength_pa: 3.0e6,
            compressive_strength_pa: 30.0e6,
            yield_strength_pa: 2.5e6,
            max_stress_pa: 30.0e6,
            brittle: true,
        }
    }

    pub fn wood() -> Self {
        Self {
            density_kg_m3: 600.0,
            tensile_strength_pa: 40.0e6,
            compressive_strength_pa: 30.0e6,
            yield_strength_pa: 30.0e6,
            max_stress_pa: 40.0e6,
            brittle: false,
        }
    }

    pub fn metal() -> Self {
        Self {
            density_kg_m3: 7850.0,
            tensile_strength_pa: 400.0e6,
            compressive_strength_pa: 250.0e6,
            yield_strength_pa: 250.0e6,
            max_stress_pa: 400.0e6,
            brittle: false,
        }
    }

    pub fn glass() -> Self {
        Self {
            density_kg_m3: 2500.0,
            tensile_strength_pa: 33.0e6,
            compressive_strength_pa: 1.0e9,
            yield_strength_pa: 33.0e6,
            max_stress_pa: 1.0e9,
            brittle: true,
        }
    }

    pub fn brick() -> Self {
        Self {
            density_kg_m3: 1800.0,
            tensile_strength_pa: 2.0e6,
            compressive_strength_pa: 20.0e6,
            yield_strength_pa: 1.5e6,
            max_stress_pa: 20.0e6,
            brittle: true,
        }
    }

    pub fn stone() -> Self {
        Self {
            density_kg_m3: 2700.0,
            tensile_strength_pa: 10.0e6,
            compressive_strength_pa: 130.0e6,
            yield_strength_pa: 8.0e6,
            max_stress_pa: 130.0e6,
            brittle: true,
        }
    }

    /// Preset lookup by name; unknown names fall back to stone.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "concrete" => Self::concrete(),
            "wood" => Self::wood(),
            "metal" | "steel" => Self::metal(),
            "glass" => Self::glass(),
            "brick" => Self::brick(),
            _ => Self::stone(),
        }
    }

    /// Check the strength-ordering invariant.
    pub fn is_consistent(&self) -> bool {
        self.yield_strength_pa <= self.tensile_strength_pa
            && self.compressive_strength_pa <= self.max_stress_pa
    }
}

/// How a material comes apart once it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FractureBehavior {
    /// Shatters into many pieces (glass).
    Brittle,
    /// Tears/deforms before breaking (metal).
    Ductile,
    /// Splits along grain (wood).
    Fibrous,
    /// Crumbles into irregular chunks (concrete, brick, stone).
    Granular,
}

/// Material-specific fracture pattern parameters.
///
/// Attached to destructible mesh entities; read by the fracture generator to
/// shape seed distribution and piece counts.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractureProperties {
    pub behavior: FractureBehavior,
    pub min_pieces: u32,
    pub max_pieces: u32,
    /// Radial crack strength from the impact point (0-1).
    pub radial_pattern_strength: f32,
    /// Tendency to fracture along planes (0-1).
    pub planar_tendency: f32,
    /// Preferred split axis for anisotropic materials (unit vector).
    pub grain_direction: Vec3,
    /// 1.0 = sharp edges (glass), 0.0 = crumbly edges (concrete).
    pub edge_sharpness: f32,
    /// Irregularity of the seed pattern (0-1); also scales the local
    /// fragment-size perturbation during stress-guided sampling.
    pub seed_randomness: f32,
}

impl Default for FractureProperties {
    fn default() -> Self {
        Self::stone()
    }
}

impl FractureProperties {
    pub fn glass() -> Self {
        Self {
            behavior: FractureBehavior::Brittle,
            min_pieces: 8,
            max_pieces: 40,
            radial_pattern_strength: 0.9,
            planar_tendency: 0.7,
            grain_direction: Vec3::Y,
            edge_sharpness: 1.0,
            seed_randomness: 0.3,
        }
    }

    pub fn concrete() -> Self {
        Self {
            behavior: FractureBehavior::Granular,
            min_pieces: 5,
            max_pieces: 15,
            radial_pattern_strength: 0.5,
            planar_tendency: 0.2,
            grain_direction: Vec3::Y,
            edge_sharpness: 0.1,
            seed_randomness: 0.8,
        }
    }

    pub fn metal() -> Self {
        Self {
            behavior: FractureBehavior::Ductile,
            min_pieces: 1,
            max_pieces: 3,
            radial_pattern_strength: 0.2,
            planar_tendency: 0.9,
            grain_direction: Vec3::Y,
            edge_sharpness: 0.3,
            seed_randomness: 0.3,
        }
    }

    pub fn wood() -> Self {
        Self {
            behavior: FractureBehavior::Fibrous,
            min_pieces: 3,
            max_pieces: 8,
            radial_pattern_strength: 0.4,
            planar_tendency: 0.6,
            grain_direction: Vec3::Y,
            edge_sharpness: 0.6,
            seed_randomness: 0.5,
        }
    }

    pub fn brick() -> Self {
        Self {
            behavior: FractureBehavior::Granular,
            min_pieces: 4,
            max_pieces: 10,
            radial_pattern_strength: 0.4,
            planar_tendency: 0.3,
            grain_direction: Vec3::Y,
            edge_sharpness: 0.2,
            seed_randomness: 0.7,
        }
    }

    pub fn stone() -> Self {
        Self {
            behavior: FractureBehavior::Granular,
            min_pieces: 3,
            max_pieces: 8,
            radial_pattern_strength: 0.3,
            planar_tendency: 0.4,
            grain_direction: Vec3::Y,
            edge_sharpness: 0.1,
            seed_randomness: 0.6,
        }
    }

    /// Preset lookup by name; unknown names fall back to stone.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "glass" => Self::glass(),
            "concrete" => Self::concrete(),
            "metal" | "steel" => Self::metal(),
            "wood" => Self::wood(),
            "brick" => Self::brick(),
            _ => Self::stone(),
        }
    }

    /// Piece count for a given impact energy ratio.
    ///
    /// `energy_ratio` is clamped to [0, 1]; 1.0 yields `max_pieces`.
    pub fn piece_count(&self, energy_ratio: f32) -> u32 {
        let e = if energy_ratio.is_finite() {
            energy_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let count =
            self.min_pieces as f32 + (self.max_pieces.saturating_sub(self.min_pieces)) as f32 * e;
        count.round() as u32
    }

    /// Is the grain direction meaningful (non-zero)?
    pub fn has_grain(&self) -> bool {
        self.grain_direction.length_squared() > f32::EPSILON
    }
}
