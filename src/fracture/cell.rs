//! Bounded Voronoi cell construction.
//!
//! Each cell starts as the mesh AABB and is clipped by the bisector
//! half-space against every other seed. This is an approximate bounded
//! Voronoi diagram: cells are convex intersections of half-spaces with the
//! AABB hull, not a Delaunay-derived diagram. Good enough for debris, cheap
//! enough for real time.

use bevy::prelude::*;
use rayon::prelude::*;

use crate::constants::{GEOM_EPSILON, HALF_SPACE_TOLERANCE};

/// Dedup tolerance for vertices shared between clipped faces.
const VERTEX_WELD_EPSILON_SQ: f32 = 1e-10;

/// Convex polytope maintained as a set of polygonal faces.
#[derive(Debug, Clone)]
pub struct ConvexCell {
    faces: Vec<Vec<Vec3>>,
}

impl ConvexCell {
    /// The six quad faces of an axis-aligned box.
    pub fn from_aabb(min: Vec3, max: Vec3) -> Self {
        let c = [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(max.x, max.y, max.z),
            Vec3::new(min.x, max.y, max.z),
        ];
        let faces = vec![
            vec![c[0], c[3], c[2], c[1]], // -Z
            vec![c[4], c[5], c[6], c[7]], // +Z
            vec![c[0], c[1], c[5], c[4]], // -Y
            vec![c[3], c[7], c[6], c[2]], // +Y
            vec![c[0], c[4], c[7], c[3]], // -X
            vec![c[1], c[2], c[6], c[5]], // +X
        ];
        Self { faces }
    }

    /// Clip by the half-space `(x - plane_point) . normal >= -tolerance`.
    ///
    /// Face polygons are clipped Sutherland-Hodgman style; the intersection
    /// points form a new cap face sorted around the plane normal.
    pub fn clip(&mut self, plane_point: Vec3, normal: Vec3) {
        let mut new_faces = Vec::with_capacity(self.faces.len() + 1);
        let mut ring: Vec<Vec3> = Vec::new();

        for face in &self.faces {
            let n = face.len();
            let mut clipped: Vec<Vec3> = Vec::with_capacity(n + 2);
            for i in 0..n {
                let cur = face[i];
                let next = face[(i + 1) % n];
                let d_cur = (cur - plane_point).dot(normal);
                let d_next = (next - plane_point).dot(normal);
                let keep_cur = d_cur >= -HALF_SPACE_TOLERANCE;
                let keep_next = d_next >= -HALF_SPACE_TOLERANCE;

                if keep_cur {
                    clipped.push(cur);
                }
                if keep_cur != keep_next {
                    // Signs differ, so the denominator is non-zero.
                    let t = (d_cur / (d_cur - d_next)).clamp(0.0, 1.0);
                    let p = cur + (next - cur) * t;
                    clipped.push(p);
                    ring.push(p);
                }
            }
            if clipped.len() >= 3 {
                new_faces.push(clipped);
            }
        }

        if let Some(cap) = build_cap_face(ring, normal) {
            new_faces.push(cap);
        }
        self.faces = new_faces;
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Unique vertices in deterministic face order.
    pub fn vertices(&self) -> Vec<Vec3> {
        let mut out: Vec<Vec3> = Vec::new();
        for face in &self.faces {
            for &p in face {
                if !out
                    .iter()
                    .any(|q| q.distance_squared(p) < VERTEX_WELD_EPSILON_SQ)
                {
                    out.push(p);
                }
            }
        }
        out
    }
}

/// Order the intersection ring around the clipping-plane normal.
fn build_cap_face(mut ring: Vec<Vec3>, normal: Vec3) -> Option<Vec<Vec3>> {
    ring.dedup_by(|a, b| a.distance_squared(*b) < VERTEX_WELD_EPSILON_SQ);
    let mut unique: Vec<Vec3> = Vec::with_capacity(ring.len());
    for p in ring {
        if !unique
            .iter()
            .any(|q| q.distance_squared(p) < VERTEX_WELD_EPSILON_SQ)
        {
            unique.push(p);
        }
    }
    if unique.len() < 3 {
        return None;
    }

    let center = unique.iter().copied().sum::<Vec3>() / unique.len() as f32;
    let u = normal.any_orthonormal_vector();
    let v = normal.cross(u);
    unique.sort_by(|a, b| {
        let pa = *a - center;
        let pb = *b - center;
        let angle_a = pa.dot(v).atan2(pa.dot(u));
        let angle_b = pb.dot(v).atan2(pb.dot(u));
        angle_a
            .partial_cmp(&angle_b)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Some(unique)
}

/// Construct one bounded Voronoi cell per seed.
///
/// Parallel across seeds; pure and order-preserving, so output is
/// deterministic for a given seed list. Degenerate (coincident) seed pairs
/// skip their undefined bisector, matching the half-space tolerance policy.
pub fn compute_voronoi_cells(seeds: &[Vec3], aabb_min: Vec3, aabb_max: Vec3) -> Vec<Vec<Vec3>> {
    seeds
        .par_iter()
        .enumerate()
        .map(|(i, &seed)| {
            let mut cell = ConvexCell::from_aabb(aabb_min, aabb_max);
            for (j, &other) in seeds.iter().enumerate() {
                if i == j {
                    continue;
                }
                let normal = seed - other;
                let len = normal.length();
                if len <= GEOM_EPSILON {
                    continue;
                }
                cell.clip((seed + other) * 0.5, normal / len);
                if cell.is_empty() {
                    break;
                }
            }
            cell.vertices()
        })
        .collect()
}

/// Fan triangulation over a cell's vertex list: a tetrahedron over the first
/// four vertices, then `(0, i-1, i)` for each further vertex. Fewer than four
/// vertices triangulate to nothing.
pub fn fan_triangulate(vertex_count: usize) -> Vec<[u32; 3]> {
    if vertex_count < 4 {
        return Vec::new();
    }
    let mut indices: Vec<[u32; 3]> = vec![[0, 1, 2], [0, 2, 3], [0, 3, 1], [1, 3, 2]];
    for i in 4..vertex_count as u32 {
        indices.push([0, i - 1, i]);
    }
    indices
}

/// Planar-projection UVs on the plane perpendicular to the AABB's dominant
/// axis, normalized by the remaining two extents.
pub fn planar_uvs(vertices: &[Vec3], aabb_min: Vec3, aabb_max: Vec3) -> Vec<Vec2> {
    let size = aabb_max - aabb_min;
    let dominant = if size.y > size.x && size.y > size.z {
        1
    } else if size.z > size.x && size.z > size.y {
        2
    } else {
        0
    };

    vertices
        .iter()
        .map(|v| match dominant {
            0 => Vec2::new(
                (v.y - aabb_min.y) / size.y.max(0.001),
                (v.z - aabb_min.z) / size.z.max(0.001),
            ),
            1 => Vec2::new(
                (v.x - aabb_min.x) / size.x.max(0.001),
                (v.z - aabb_min.z) / size.z.max(0.001),
            ),
            _ => Vec2::new(
                (v.x - aabb_min.x) / size.x.max(0.001),
                (v.y - aabb_min.y) / size.y.max(0.001),
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_seed_keeps_whole_aabb() {
        let cells = compute_voronoi_cells(&[Vec3::splat(0.5)], Vec3::ZERO, Vec3::ONE);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].len(), 8);
    }

    #[test]
    fn two_seeds_split_the_box() {
        let seeds = [Vec3::new(0.25, 0.5, 0.5), Vec3::new(0.75, 0.5, 0.5)];
        let cells = compute_voronoi_cells(&seeds, Vec3::ZERO, Vec3::ONE);
        assert_eq!(cells.len(), 2);
        for (cell, seed) in cells.iter().zip(&seeds) {
            // Each half-box keeps 4 corners plus the 4-point cap at x = 0.5.
            assert_eq!(cell.len(), 8);
            for v in cell {
                assert!(v.x >= -1e-4 && v.x <= 1.0 + 1e-4);
                // No vertex crosses the bisector plane toward the other seed.
                let own = v.distance(*seed);
                let other = seeds.iter().map(|s| v.distance(*s)).fold(f32::MAX, f32::min);
                assert!(own <= other + 1e-4);
            }
        }
    }

    #[test]
    fn every_seed_keeps_a_nonempty_cell() {
        let seeds: Vec<Vec3> = (0..12)
            .map(|i| {
                let f = i as f32 / 12.0;
                Vec3::new(f, (f * 7.3).fract(), (f * 3.1).fract())
            })
            .collect();
        let cells = compute_voronoi_cells(&seeds, Vec3::ZERO, Vec3::ONE);
        assert_eq!(cells.len(), seeds.len());
        for (cell, seed) in cells.iter().zip(&seeds) {
            assert!(cell.len() >= 4, "cell for {seed:?} degenerated");
            // The cell must stay near its seed: every vertex is closer to its
            // own seed than to any other (within tolerance).
            for v in cell {
                let own = v.distance(*seed);
                for other in &seeds {
                    assert!(own <= v.distance(*other) + 1e-3);
                }
            }
        }
    }

    #[test]
    fn coincident_seeds_do_not_panic() {
        let seeds = [Vec3::splat(0.5), Vec3::splat(0.5)];
        let cells = compute_voronoi_cells(&seeds, Vec3::ZERO, Vec3::ONE);
        assert_eq!(cells.len(), 2);
        // Undefined bisector is skipped; both cells keep the box.
        assert_eq!(cells[0].len(), 8);
    }

    #[test]
    fn fan_triangulation_counts() {
        assert!(fan_triangulate(3).is_empty());
        assert_eq!(fan_triangulate(4).len(), 4);
        assert_eq!(fan_triangulate(8).len(), 8);
        // First four indices form the seed tetrahedron.
        assert_eq!(fan_triangulate(5)[0], [0, 1, 2]);
        assert_eq!(fan_triangulate(5)[4], [0, 3, 4]);
    }

    #[test]
    fn uvs_stay_in_unit_range_for_cell_vertices() {
        let verts = ConvexCell::from_aabb(Vec3::ZERO, Vec3::new(2.0, 1.0, 0.5)).vertices();
        let uvs = planar_uvs(&verts, Vec3::ZERO, Vec3::new(2.0, 1.0, 0.5));
        assert_eq!(uvs.len(), verts.len());
        for uv in uvs {
            assert!((0.0..=1.0).contains(&uv.x));
            assert!((0.0..=1.0).contains(&uv.y));
        }
    }
}
