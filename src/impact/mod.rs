//! Impact events produced by external physics (ballistics, explosions,
//! collisions) and consumed once by the destruction pipeline.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_IMPULSE_DURATION_S, IMPACT_PENETRATION_DEPTH_M, REFERENCE_FRACTURE_ENERGY_J,
};

/// Shape of the energy delivery; drives seed distribution and fragment
/// ejection direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImpactType {
    /// Projectile: small fragments near the entry point, cone ejection.
    Point,
    /// Wide-area strike: medium depression with radial spread.
    Blunt,
    /// Near-uniform fragmentation, energetic radial ejection.
    Explosion,
    /// Blade-like: fragments sized along the cut, perpendicular ejection.
    Cutting,
    /// Vertical compression: horizontal spread.
    Crushing,
    /// Lateral offset: tangential ejection.
    Shearing,
}

/// A single impact on a destructible mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEvent {
    /// World-space hit location.
    pub position: Vec3,
    /// Direction of force (unit vector).
    pub direction: Vec3,
    pub kinetic_energy_j: f32,
    pub impact_type: ImpactType,
    /// Peak force; derived from energy when absent.
    pub force_n: Option<f32>,
    /// Impulse duration; defaulted when absent.
    pub impulse_duration_s: Option<f32>,
}

impl ImpactEvent {
    pub fn new(position: Vec3, direction: Vec3, kinetic_energy_j: f32, kind: ImpactType) -> Self {
        Self {
            position,
            direction,
            kinetic_energy_j,
            impact_type: kind,
            force_n: None,
            impulse_duration_s: None,
        }
    }

    /// Effective force: explicit value, or energy spread over the assumed
    /// penetration depth.
    pub fn force(&self) -> f32 {
        self.force_n
            .unwrap_or(self.kinetic_energy_j / IMPACT_PENETRATION_DEPTH_M)
    }

    /// Effective impulse duration.
    pub fn impulse_duration(&self) -> f32 {
        self.impulse_duration_s.unwrap_or(DEFAULT_IMPULSE_DURATION_S)
    }

    /// Energy normalized against the reference fracture energy, in [0, 1].
    pub fn energy_ratio(&self) -> f32 {
        (self.kinetic_energy_j / REFERENCE_FRACTURE_ENERGY_J).clamp(0.0, 1.0)
    }
}

/// Event targeting a destructible mesh entity with an impact.
#[derive(Event, Debug, Clone)]
pub struct MeshImpact {
    pub entity: Entity,
    pub impact: ImpactEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_derives_from_energy_when_absent() {
        let i = ImpactEvent::new(Vec3::ZERO, Vec3::X, 500.0, ImpactType::Point);
        assert_eq!(i.force(), 500.0 / IMPACT_PENETRATION_DEPTH_M);
        assert_eq!(i.impulse_duration(), DEFAULT_IMPULSE_DURATION_S);
    }

    #[test]
    fn explicit_force_wins() {
        let mut i = ImpactEvent::new(Vec3::ZERO, Vec3::X, 500.0, ImpactType::Blunt);
        i.force_n = Some(1234.0);
        i.impulse_duration_s = Some(0.25);
        assert_eq!(i.force(), 1234.0);
        assert_eq!(i.impulse_duration(), 0.25);
    }

    #[test]
    fn energy_ratio_clamps() {
        let mut i = ImpactEvent::new(Vec3::ZERO, Vec3::X, 0.0, ImpactType::Explosion);
        assert_eq!(i.energy_ratio(), 0.0);
        i.kinetic_energy_j = REFERENCE_FRACTURE_ENERGY_J * 10.0;
        assert_eq!(i.energy_ratio(), 1.0);
        i.kinetic_energy_j = REFERENCE_FRACTURE_ENERGY_J * 0.5;
        assert_eq!(i.energy_ratio(), 0.5);
    }
}
