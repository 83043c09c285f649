//! Destruction pipeline wiring.
//!
//! One chained `Update` pass per simulation tick:
//! stress analysis -> fracture generation -> debris management.
//! Stress writes to `fractured` flags happen before the generator reads them;
//! generator registrations happen before the debris eviction scan. Fragments
//! created this tick have age 0 and are never age-evicted in the same tick.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::debris::DebrisManager;
use crate::fracture::{FractureConfig, FractureGenerator};
use crate::impact::{ImpactEvent, MeshImpact};
use crate::material::FractureProperties;
use crate::stress;

/// Gravity used for structural load calculation. Distinct from the rigid-body
/// integrator's gravity, which belongs to the external physics step.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructuralGravity(pub Vec3);

impl Default for StructuralGravity {
    fn default() -> Self {
        Self(Vec3::new(0.0, -9.81, 0.0))
    }
}

/// Camera position the debris manager measures LOD distances against.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerPosition(pub Vec3);

/// Pipeline-level fracture defaults applied when a failed mesh is queued.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestructionSettings {
    pub poisson_min_distance: f32,
    /// Base seed; each fracture call mixes in the entity index so distinct
    /// meshes shatter differently while runs stay reproducible.
    pub base_seed: u64,
    pub generate_voxel_approximation: bool,
}

impl Default for DestructionSettings {
    fn default() -> Self {
        Self {
            poisson_min_distance: 0.25,
            base_seed: 0,
            generate_voxel_approximation: false,
        }
    }
}

/// A mesh that failed this tick, waiting for the fracture generator.
#[derive(Debug, Clone)]
pub struct PendingFracture {
    pub entity: Entity,
    pub failed_vertices: Vec<u32>,
    /// First impact that hit the mesh this tick, if any.
    pub impact: Option<ImpactEvent>,
}

/// Hand-off buffer between the stress analyzer and the fracture generator.
#[derive(Resource, Debug, Default)]
pub struct FractureQueue {
    pending: Vec<PendingFracture>,
}

impl FractureQueue {
    pub fn push(&mut self, job: PendingFracture) {
        self.pending.push(job);
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.pending.iter().any(|job| job.entity == entity)
    }

    pub fn drain(&mut self) -> Vec<PendingFracture> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Consume the fracture queue: one generator call per failed mesh.
pub fn run_fracture_queue(world: &mut World) {
    let pending = match world.get_resource_mut::<FractureQueue>() {
        Some(mut queue) => queue.drain(),
        None => return,
    };

    for job in pending {
        let material = world
            .get::<FractureProperties>(job.entity)
            .cloned()
            .unwrap_or_default();
        let settings = world
            .get_resource::<DestructionSettings>()
            .cloned()
            .unwrap_or_default();
        let config = FractureConfig {
            num_fragments: 0,
            poisson_min_distance: settings.poisson_min_distance,
            random_seed: settings.base_seed.wrapping_add(job.entity.index() as u64),
            impact: job.impact.clone(),
            material,
            generate_voxel_approximation: settings.generate_voxel_approximation,
        };

        world.resource_scope(|world, mut generator: Mut<FractureGenerator>| {
            let fragments = match &job.impact {
                Some(impact) => generator.fracture_mesh_at_point(
                    world,
                    job.entity,
                    impact.position,
                    impact.direction,
                    impact.kinetic_energy_j,
                    &config,
                ),
                None => generator.fracture_along_stress_lines(
                    world,
                    job.entity,
                    &job.failed_vertices,
                    &config,
                ),
            };
            debug!(entity = ?job.entity, fragments, "fracture job processed");
        });
    }
}

/// Run the debris manager's per-tick maintenance.
pub fn update_debris(world: &mut World) {
    let dt = world
        .get_resource::<Time>()
        .map(|t| t.delta_secs())
        .unwrap_or(0.0);
    world.resource_scope(|world, mut manager: Mut<DebrisManager>| {
        manager.update(world, dt);
    });
}

/// The full destruction pipeline, scheduled in strict stage order.
pub struct DestructionPlugin;

impl Plugin for DestructionPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(StructuralGravity::default())
            .init_resource::<ViewerPosition>()
            .init_resource::<FractureQueue>()
            .insert_resource(DestructionSettings::default())
            .init_resource::<FractureGenerator>()
            .init_resource::<DebrisManager>()
            .add_event::<MeshImpact>()
            .add_systems(
                Update,
                (stress::analyze_structures, run_fracture_queue, update_debris).chain(),
            );
    }
}
