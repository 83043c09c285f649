//! Voronoi fracture generation.
//!
//! Turns a failed destructible mesh plus an impact into a population of
//! debris entities with physics-ready attributes. Fracture calls are total:
//! degenerate input yields zero fragments, never a panic.

pub mod cell;
pub mod piece;
pub mod sampling;

use bevy::prelude::*;
use bevy_rapier3d::prelude::{
    AdditionalMassProperties, Collider, MassProperties, RigidBody, Velocity,
};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::GEOM_EPSILON;
use crate::debris::DebrisManager;
use crate::impact::{ImpactEvent, ImpactType};
use crate::material::FractureProperties;
use crate::mesh::DestructibleMesh;
use piece::DebrisPiece;

/// Why a fracture call produced nothing. Public operations map these to a
/// zero fragment count; the typed kinds exist for logs and tests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FractureError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("entity is gone or has no destructible mesh")]
    NotFound,
}

/// Per-call fracture parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractureConfig {
    /// Requested fragment count; 0 derives the count from impact energy.
    /// Either way the result clamps to the material's piece range.
    pub num_fragments: u32,
    /// Base minimum seed spacing (m).
    pub poisson_min_distance: f32,
    pub random_seed: u64,
    pub impact: Option<ImpactEvent>,
    pub material: FractureProperties,
    pub generate_voxel_approximation: bool,
}

impl Default for FractureConfig {
    fn default() -> Self {
        Self {
            num_fragments: 0,
            poisson_min_distance: 0.25,
            random_seed: 0,
            impact: None,
            material: FractureProperties::stone(),
            generate_voxel_approximation: false,
        }
    }
}

impl FractureConfig {
    pub fn validate(&self) -> Result<(), FractureError> {
        if !(self.poisson_min_distance > 0.0) || !self.poisson_min_distance.is_finite() {
            return Err(FractureError::InvalidInput(
                "poisson_min_distance must be positive and finite",
            ));
        }
        if self.material.min_pieces > self.material.max_pieces {
            return Err(FractureError::InvalidInput("min_pieces > max_pieces"));
        }
        Ok(())
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

/// Fracture generator with per-instance statistics.
///
/// Holds no world state: it borrows the world for the duration of one call,
/// produces owned fragments, and hands ownership to the world immediately.
#[derive(Resource, Debug, Default)]
pub struct FractureGenerator {
    pub fractures_performed: u64,
    pub fragments_spawned: u64,
}

impl FractureGenerator {
    /// Fracture a mesh around an impact point. Returns the fragment count;
    /// 0 when nothing could be generated.
    pub fn fracture_mesh_at_point(
        &mut self,
        world: &mut World,
        entity: Entity,
        impact_point: Vec3,
        impact_direction: Vec3,
        kinetic_energy_j: f32,
        config: &FractureConfig,
    ) -> u32 {
        let mut impact = config.impact.clone().unwrap_or_else(|| {
            ImpactEvent::new(impact_point, impact_direction, kinetic_energy_j, ImpactType::Point)
        });
        impact.position = impact_point;
        impact.direction = impact_direction;
        impact.kinetic_energy_j = kinetic_energy_j;

        match self.try_fracture(world, entity, Some(impact), &[], config) {
            Ok(count) => count,
            Err(err) => {
                warn!(entity = ?entity, %err, "fracture_mesh_at_point produced no fragments");
                0
            }
        }
    }

    /// Fracture along structural failure lines: seeds come from the failed
    /// vertices instead of a single impact point.
    pub fn fracture_along_stress_lines(
        &mut self,
        world: &mut World,
        entity: Entity,
        failed_vertices: &[u32],
        config: &FractureConfig,
    ) -> u32 {
        match self.try_fracture(world, entity, config.impact.clone(), failed_vertices, config) {
            Ok(count) => count,
            Err(err) => {
                warn!(entity = ?entity, %err, "fracture_along_stress_lines produced no fragments");
                0
            }
        }
    }

    fn try_fracture(
        &mut self,
        world: &mut World,
        entity: Entity,
        impact: Option<ImpactEvent>,
        failed_vertices: &[u32],
        config: &FractureConfig,
    ) -> Result<u32, FractureError> {
        config.validate()?;

        let mesh = world
            .get::<DestructibleMesh>(entity)
            .ok_or(FractureError::NotFound)?
            .clone();
        if !mesh.is_fracturable() {
            return Err(FractureError::InvalidInput("empty or non-finite mesh"));
        }
        let transform = world.get::<Transform>(entity).copied().unwrap_or_default();
        let (aabb_min, aabb_max) = mesh.aabb();

        // The generator works in mesh-local space.
        let local_impact = impact.as_ref().map(|i| {
            let mut local = i.clone();
            local.position = transform.rotation.inverse() * (i.position - transform.translation);
            local.direction = transform.rotation.inverse() * i.direction;
            local
        });

        let energy_ratio = local_impact.as_ref().map_or(0.5, |i| i.energy_ratio());
        let requested = if config.num_fragments > 0 {
            config.num_fragments
        } else {
            config.material.piece_count(energy_ratio)
        };
        let target = requested
            .clamp(config.material.min_pieces.max(1), config.material.max_pieces.max(1))
            as usize;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.random_seed);
        let mut seeds = if !failed_vertices.is_empty() {
            let positions: Vec<Vec3> = failed_vertices
                .iter()
                .filter_map(|&i| mesh.vertices.get(i as usize).copied())
                .collect();
            sampling::seeds_from_failed_vertices(
                &positions,
                aabb_min,
                aabb_max,
                config.poisson_min_distance,
                target,
                &mut rng,
            )
        } else if let Some(imp) = &local_impact {
            sampling::stress_guided_samples(
                aabb_min,
                aabb_max,
                config.poisson_min_distance,
                target,
                imp,
                &config.material,
                &mut rng,
            )
        } else {
            sampling::poisson_samples(
                aabb_min,
                aabb_max,
                config.poisson_min_distance,
                target,
                &mut rng,
            )
        };
        if seeds.is_empty() {
            debug!(entity = ?entity, "no fracture seeds generated");
            return Ok(0);
        }
        if let Some(imp) = &local_impact {
            sampling::apply_behavior_pattern(
                &mut seeds,
                imp,
                &config.material,
                aabb_min,
                aabb_max,
                config.poisson_min_distance,
                &mut rng,
            );
        }

        let cells = cell::compute_voronoi_cells(&seeds, aabb_min, aabb_max);
        let now = world
            .get_resource::<Time>()
            .map(|t| t.elapsed_secs())
            .unwrap_or(0.0);

        let mut pieces: Vec<DebrisPiece> = Vec::with_capacity(cells.len());
        for cell_vertices in cells {
            // A 3D fragment needs at least a tetrahedron.
            if cell_vertices.len() < 4 {
                continue;
            }
            let mut piece = DebrisPiece::from_cell(cell_vertices, now);
            if let Some(imp) = &local_impact {
                piece.apply_impact_response(imp, pieces.len(), config.random_seed);
            }
            if config.generate_voxel_approximation {
                piece.voxelize();
            }
            pieces.push(piece);
        }
        if pieces.is_empty() {
            debug!(entity = ?entity, "all cells degenerated; source mesh kept");
            return Ok(0);
        }

        let mut registrations = Vec::with_capacity(pieces.len());
        for mut piece in pieces {
            let world_position = transform.translation + transform.rotation * piece.centroid;
            piece.position = world_position;
            piece.linear_velocity = transform.rotation * piece.linear_velocity;
            piece.angular_velocity = transform.rotation * piece.angular_velocity;

            let half_extents =
                ((piece.aabb_max - piece.aabb_min) * 0.5).max(Vec3::splat(GEOM_EPSILON));
            let local_vertices: Vec<Vec3> =
                piece.vertices.iter().map(|v| *v - piece.centroid).collect();
            let collider = Collider::convex_hull(&local_vertices)
                .unwrap_or_else(|| Collider::cuboid(half_extents.x, half_extents.y, half_extents.z));
            let velocity = Velocity {
                linvel: piece.linear_velocity,
                angvel: piece.angular_velocity,
            };
            let mass_properties = AdditionalMassProperties::MassProperties(MassProperties {
                local_center_of_mass: Vec3::ZERO,
                mass: piece.mass_kg,
                principal_inertia_local_frame: Quat::IDENTITY,
                principal_inertia: piece.inertia_tensor,
            });
            let triangle_count = piece.triangle_count;

            let id = world
                .spawn((
                    Transform::from_translation(world_position),
                    RigidBody::Dynamic,
                    velocity,
                    mass_properties,
                    collider,
                    piece,
                ))
                .id();
            registrations.push((id, triangle_count, world_position));
        }

        let count = registrations.len() as u32;
        if let Some(mut manager) = world.get_resource_mut::<DebrisManager>() {
            for (id, triangles, position) in registrations {
                manager.register(id, triangles, position);
            }
        }
        world.despawn(entity);

        self.fractures_performed += 1;
        self.fragments_spawned += count as u64;
        info!(
            entity = ?entity,
            fragments = count,
            seed = config.random_seed,
            "voronoi fracture complete"
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::DestructibleMesh;

    fn spawn_cube(world: &mut World) -> Entity {
        world
            .spawn((
                Transform::default(),
                DestructibleMesh::cuboid(Vec3::ONE),
                FractureProperties::stone(),
            ))
            .id()
    }

    #[test]
    fn fracture_replaces_mesh_with_fragments() {
        let mut world = World::new();
        let entity = spawn_cube(&mut world);
        let mut generator = FractureGenerator::default();

        let config = FractureConfig {
            num_fragments: 6,
            poisson_min_distance: 0.1,
            random_seed: 42,
            material: FractureProperties::stone(),
            ..Default::default()
        };
        let count = generator.fracture_mesh_at_point(
            &mut world,
            entity,
            Vec3::ZERO,
            Vec3::NEG_Y,
            500.0,
            &config,
        );

        assert!(count > 0);
        assert!(world.get_entity(entity).is_err(), "source mesh despawned");
        let mut pieces = world.query::<&DebrisPiece>();
        assert_eq!(pieces.iter(&world).count() as u32, count);
        for piece in pieces.iter(&world) {
            assert!(piece.mass_kg >= 0.1);
            assert!((piece.rotation.length() - 1.0).abs() < 1e-5);
            assert!(piece.inertia_tensor.cmpge(Vec3::ZERO).all());
        }
        assert_eq!(generator.fractures_performed, 1);
        assert_eq!(generator.fragments_spawned, count as u64);
    }

    #[test]
    fn fragment_count_clamps_to_material_range() {
        let mut world = World::new();
        let entity = spawn_cube(&mut world);
        let mut generator = FractureGenerator::default();

        // Metal tears into at most 3 pieces no matter what is requested.
        let config = FractureConfig {
            num_fragments: 50,
            poisson_min_distance: 0.05,
            random_seed: 7,
            material: FractureProperties::metal(),
            ..Default::default()
        };
        let count = generator.fracture_mesh_at_point(
            &mut world,
            entity,
            Vec3::ZERO,
            Vec3::NEG_Y,
            2000.0,
            &config,
        );
        assert!(count >= 1 && count <= 3, "got {count}");
    }

    #[test]
    fn missing_entity_returns_zero() {
        let mut world = World::new();
        let stale = world.spawn_empty().id();
        world.despawn(stale);
        let mut generator = FractureGenerator::default();
        let count = generator.fracture_mesh_at_point(
            &mut world,
            stale,
            Vec3::ZERO,
            Vec3::NEG_Y,
            100.0,
            &FractureConfig::default(),
        );
        assert_eq!(count, 0);
        assert_eq!(generator.fractures_performed, 0);
    }

    #[test]
    fn empty_mesh_returns_zero() {
        let mut world = World::new();
        let entity = world
            .spawn((Transform::default(), DestructibleMesh::default()))
            .id();
        let mut generator = FractureGenerator::default();
        let count = generator.fracture_mesh_at_point(
            &mut world,
            entity,
            Vec3::ZERO,
            Vec3::NEG_Y,
            100.0,
            &FractureConfig::default(),
        );
        assert_eq!(count, 0);
        assert!(world.get_entity(entity).is_ok(), "degenerate mesh survives");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = FractureConfig {
            poisson_min_distance: 0.0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(FractureError::InvalidInput(
                "poisson_min_distance must be positive and finite"
            ))
        );
    }

    #[test]
    fn stress_line_fracture_spawns_fragments() {
        let mut world = World::new();
        let entity = spawn_cube(&mut world);
        let mut generator = FractureGenerator::default();

        let config = FractureConfig {
            num_fragments: 5,
            poisson_min_distance: 0.1,
            random_seed: 11,
            material: FractureProperties::concrete(),
            ..Default::default()
        };
        let count =
            generator.fracture_along_stress_lines(&mut world, entity, &[0, 6, 3], &config);
        assert!(count >= 1);

        // No impact: fragments start at rest.
        let mut pieces = world.query::<&DebrisPiece>();
        for piece in pieces.iter(&world) {
            assert_eq!(piece.linear_velocity, Vec3::ZERO);
        }
    }

    #[test]
    fn config_json_roundtrip() {
        let config = FractureConfig {
            num_fragments: 12,
            poisson_min_distance: 0.3,
            random_seed: 99,
            impact: Some(ImpactEvent::new(Vec3::X, Vec3::NEG_X, 250.0, ImpactType::Cutting)),
            material: FractureProperties::glass(),
            generate_voxel_approximation: true,
        };
        let json = config.to_json();
        let parsed = FractureConfig::from_json(&json).expect("round-trip");
        assert_eq!(parsed, config);
    }
}
