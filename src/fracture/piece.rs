//! Debris fragment data and physics attributes.
//!
//! Geometry fields (`vertices`, `centroid`, AABB) are mesh-local; `position`,
//! `linear_velocity` and `angular_velocity` are world-space, filled in by the
//! generator when it spawns the fragment entity.

use bevy::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CRUSHING_VERTICAL_DAMP, CUTTING_SPEED_MULT, EXPLOSION_SPEED_MULT, FRAGMENT_DENSITY_KG_M3,
    GEOM_EPSILON, MIN_FRAGMENT_MASS_KG, MIN_IMPACT_DISTANCE_M, TUMBLE_FACTOR, VOXEL_GRID_DIM,
};
use crate::fracture::cell::{fan_triangulate, planar_uvs};
use crate::impact::{ImpactEvent, ImpactType};
use crate::mesh::aabb_of;

/// Fixed 4x4x4 occupancy grid spanning a fragment's AABB, one bit per cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoxelGrid {
    pub occupancy: u64,
}

impl VoxelGrid {
    fn bit(x: usize, y: usize, z: usize) -> u64 {
        1u64 << (x + y * VOXEL_GRID_DIM + z * VOXEL_GRID_DIM * VOXEL_GRID_DIM)
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize) {
        self.occupancy |= Self::bit(x, y, z);
    }

    pub fn is_occupied(&self, x: usize, y: usize, z: usize) -> bool {
        self.occupancy & Self::bit(x, y, z) != 0
    }

    pub fn occupied_count(&self) -> u32 {
        self.occupancy.count_ones()
    }
}

/// A single debris fragment, promoted to a rigid body on spawn.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct DebrisPiece {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub centroid: Vec3,
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
    pub mass_kg: f32,
    /// Diagonal inertia tensor (box approximation).
    pub inertia_tensor: Vec3,
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub creation_time: f32,
    pub triangle_count: u32,
    pub voxel_occupancy: Option<VoxelGrid>,
    pub merged: bool,
}

impl DebrisPiece {
    /// Build a fragment from a Voronoi cell's vertex list.
    ///
    /// The cell polytope itself is the fragment geometry: fan triangulation,
    /// outward normals, planar UVs, box-approximated mass and inertia.
    pub fn from_cell(vertices: Vec<Vec3>, creation_time: f32) -> Self {
        let indices = fan_triangulate(vertices.len());
        let (aabb_min, aabb_max) = aabb_of(&vertices);

        let centroid = if vertices.is_empty() {
            Vec3::ZERO
        } else {
            vertices.iter().copied().sum::<Vec3>() / vertices.len() as f32
        };

        let size = aabb_max - aabb_min;
        let mass_kg = (size.x * size.y * size.z * FRAGMENT_DENSITY_KG_M3).max(MIN_FRAGMENT_MASS_KG);
        let inertia_tensor = Vec3::new(
            mass_kg / 12.0 * (size.y * size.y + size.z * size.z),
            mass_kg / 12.0 * (size.x * size.x + size.z * size.z),
            mass_kg / 12.0 * (size.x * size.x + size.y * size.y),
        );

        let normals = vertices
            .iter()
            .map(|v| {
                let out = *v - centroid;
                if out.length_squared() > GEOM_EPSILON {
                    out.normalize()
                } else {
                    Vec3::Y
                }
            })
            .collect();
        let uvs = planar_uvs(&vertices, aabb_min, aabb_max);
        let triangle_count = indices.len() as u32;

        Self {
            vertices,
            indices,
            normals,
            uvs,
            centroid,
            aabb_min,
            aabb_max,
            mass_kg,
            inertia_tensor,
            position: centroid,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            creation_time,
            triangle_count,
            voxel_occupancy: None,
            merged: false,
        }
    }

    pub fn age(&self, now: f32) -> f32 {
        now - self.creation_time
    }

    /// Initial velocities from an impact.
    ///
    /// Magnitude is the impulse over mass, damped by distance from the hit;
    /// direction follows the impact type. Tumbling is seeded by
    /// `seed + fragment_index` so a given seed reproduces the same debris.
    pub fn apply_impact_response(&mut self, impact: &ImpactEvent, fragment_index: usize, seed: u64) {
        let to_piece = self.centroid - impact.position;
        let dist = to_piece.length();
        if dist <= GEOM_EPSILON {
            return;
        }
        let radial = to_piece / dist;

        let mut speed =
            (impact.force() * impact.impulse_duration() / self.mass_kg) / dist.max(MIN_IMPACT_DISTANCE_M);

        let direction = match impact.impact_type {
            ImpactType::Point => {
                // Cone-shaped ejection: blend toward the impact direction only
                // on the exit side.
                if radial.dot(impact.direction) > 0.0 {
                    normalize_or(impact.direction * 0.7 + radial * 0.3, radial)
                } else {
                    radial
                }
            }
            ImpactType::Explosion => {
                speed *= EXPLOSION_SPEED_MULT;
                radial
            }
            ImpactType::Blunt => normalize_or(impact.direction * 0.5 + radial * 0.5, radial),
            ImpactType::Cutting => {
                speed *= CUTTING_SPEED_MULT;
                let perp = impact.direction.cross(radial);
                if perp.length_squared() > GEOM_EPSILON {
                    perp.normalize()
                } else {
                    radial
                }
            }
            ImpactType::Crushing => {
                let mut v = radial;
                v.y *= CRUSHING_VERTICAL_DAMP;
                normalize_or(v, radial)
            }
            ImpactType::Shearing => {
                // Tangential component; degenerate (radial parallel to the
                // impact direction) stays tiny on purpose.
                let tangential = radial - impact.direction * radial.dot(impact.direction);
                if tangential.length_squared() > GEOM_EPSILON {
                    tangential.normalize()
                } else {
                    tangential
                }
            }
        };

        self.linear_velocity = direction * speed;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(fragment_index as u64));
        let tumble = speed * TUMBLE_FACTOR;
        self.angular_velocity = Vec3::new(
            rng.gen_range(-1.0..=1.0) * tumble,
            rng.gen_range(-1.0..=1.0) * tumble,
            rng.gen_range(-1.0..=1.0) * tumble,
        );
    }

    /// Fill the 4x4x4 occupancy grid by ray-casting each cell center against
    /// the fragment's triangles (+X direction, odd crossings = inside).
    pub fn voxelize(&mut self) {
        let mut grid = VoxelGrid::default();
        let voxel_size = (self.aabb_max - self.aabb_min) / VOXEL_GRID_DIM as f32;

        for z in 0..VOXEL_GRID_DIM {
            for y in 0..VOXEL_GRID_DIM {
                for x in 0..VOXEL_GRID_DIM {
                    let center = self.aabb_min
                        + Vec3::new(
                            (x as f32 + 0.5) * voxel_size.x,
                            (y as f32 + 0.5) * voxel_size.y,
                            (z as f32 + 0.5) * voxel_size.z,
                        );
                    if point_inside(center, &self.vertices, &self.indices) {
                        grid.set(x, y, z);
                    }
                }
            }
        }

        self.voxel_occupancy = Some(grid);
    }
}

fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    if v.length_squared() > GEOM_EPSILON {
        v.normalize()
    } else {
        fallback
    }
}

/// Odd-crossing inside test with a +X ray.
fn point_inside(point: Vec3, vertices: &[Vec3], indices: &[[u32; 3]]) -> bool {
    let mut crossings = 0u32;
    for tri in indices {
        let [a, b, c] = tri.map(|i| i as usize);
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        if ray_hits_triangle(point, Vec3::X, vertices[a], vertices[b], vertices[c]) {
            crossings += 1;
        }
    }
    crossings % 2 == 1
}

/// Moeller-Trumbore ray/triangle intersection, forward hits only.
pub(crate) fn ray_hits_triangle(origin: Vec3, dir: Vec3, v0: Vec3, v1: Vec3, v2: Vec3) -> bool {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = dir.cross(edge2);
    let a = edge1.dot(h);
    if a.abs() < GEOM_EPSILON {
        return false; // ray parallel to triangle
    }
    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = s.cross(edge1);
    let v = f * dir.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return false;
    }
    f * edge2.dot(q) > GEOM_EPSILON
}
