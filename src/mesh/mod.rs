//! Destructible mesh geometry.
//!
//! Geometry lives in mesh-local space; the entity `Transform` places it in the
//! world. The structural side (masses, loads, stress, load-bearing edges) is
//! a separate component, [`crate::stress::StructuralBody`].

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Triangle-mesh geometry of a destructible entity.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestructibleMesh {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// Triangles as vertex-index triples.
    pub indices: Vec<[u32; 3]>,
    pub uvs: Vec<Vec2>,
}

impl DestructibleMesh {
    pub fn triangle_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Axis-aligned bounding box; `(Vec3::ZERO, Vec3::ZERO)` for an empty mesh.
    pub fn aabb(&self) -> (Vec3, Vec3) {
        aabb_of(&self.vertices)
    }

    /// AABB volume in cubic meters.
    pub fn aabb_volume(&self) -> f32 {
        let (min, max) = self.aabb();
        let d = max - min;
        d.x * d.y * d.z
    }

    /// Lumped per-vertex cross-sectional area: one third of the summed area
    /// of each incident triangle. Vertices with no incident triangles get 0.
    pub fn vertex_areas(&self) -> Vec<f32> {
        let mut areas = vec![0.0f32; self.vertices.len()];
        for tri in &self.indices {
            let [a, b, c] = tri.map(|i| i as usize);
            if a >= self.vertices.len() || b >= self.vertices.len() || c >= self.vertices.len() {
                continue;
            }
            let area = 0.5
                * (self.vertices[b] - self.vertices[a])
                    .cross(self.vertices[c] - self.vertices[a])
                    .length();
            let share = area / 3.0;
            areas[a] += share;
            areas[b] += share;
            areas[c] += share;
        }
        areas
    }

    /// Index of the vertex closest to a mesh-local point.
    pub fn nearest_vertex(&self, point: Vec3) -> Option<usize> {
        self.vertices
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.distance_squared(point)
                    .partial_cmp(&b.distance_squared(point))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }

    /// Normal at a vertex, falling back to +Y when missing.
    pub fn normal_at(&self, index: usize) -> Vec3 {
        self.normals.get(index).copied().unwrap_or(Vec3::Y)
    }

    /// Geometry usable by the fracture generator: at least one finite vertex.
    pub fn is_fracturable(&self) -> bool {
        !self.vertices.is_empty() && self.vertices.iter().all(|v| v.is_finite())
    }

    /// Axis-aligned box centered at the origin, 8 vertices and 12 triangles.
    pub fn cuboid(extents: Vec3) -> Self {
        let h = extents * 0.5;
        let vertices = vec![
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(h.x, -h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
        ];
        let indices = vec![
            // -Z / +Z
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            // -Y / +Y
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
            // -X / +X
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        let normals = vertices.iter().map(|v| v.normalize_or_zero()).collect();
        let uvs = vertices
            .iter()
            .map(|v| Vec2::new(v.x / extents.x.max(1e-3) + 0.5, v.z / extents.z.max(1e-3) + 0.5))
            .collect();
        Self {
            vertices,
            normals,
            indices,
            uvs,
        }
    }

    /// Thin quad in the XY plane: 4 vertices, 2 triangles. `thickness` only
    /// offsets the vertices in Z so the AABB has depth.
    pub fn pane(width: f32, height: f32, thickness: f32) -> Self {
        let hw = width * 0.5;
        let hh = height * 0.5;
        let hz = thickness * 0.5;
        let vertices = vec![
            Vec3::new(-hw, -hh, -hz),
            Vec3::new(hw, -hh, -hz),
            Vec3::new(hw, hh, hz),
            Vec3::new(-hw, hh, hz),
        ];
        let indices = vec![[0, 1, 2], [0, 2, 3]];
        let normals = vec![Vec3::Z; 4];
        let uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        Self {
            vertices,
            normals,
            indices,
            uvs,
        }
    }
}

/// AABB of a point set; `(Vec3::ZERO, Vec3::ZERO)` when empty.
pub fn aabb_of(points: &[Vec3]) -> (Vec3, Vec3) {
    let Some(&first) = points.first() else {
        return (Vec3::ZERO, Vec3::ZERO);
    };
    let mut min = first;
    let mut max = first;
    for &p in points {
        min = min.min(p);
        max = max.max(p);
    }
    (min, max)
}
