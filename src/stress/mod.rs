//! Structural stress analysis: per-vertex load propagation, yield and
//! fracture detection, brittle crack propagation.
//!
//! Loads propagate through load-bearing edges with a fixed number of
//! directional relaxation passes. The transfer is non-conservative (the source
//! keeps its load); material thresholds are tuned against that behavior, so a
//! symmetric solver is a breaking change, not an improvement.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    CRACK_PROPAGATION_THRESHOLD, CRACK_STRESS_TRANSFER, IMPACT_AREA_M2,
    IMPACT_PENETRATION_DEPTH_M, LOAD_PROPAGATION_PASSES, LOAD_TRANSFER_RATIO,
};
use crate::impact::MeshImpact;
use crate::material::StructuralMaterial;
use crate::mesh::DestructibleMesh;
use crate::pipeline::{FractureQueue, PendingFracture, StructuralGravity};

/// Per-vertex stress state, recalculated each tick.
///
/// `fractured` is monotonic: once set it survives every reset for the
/// lifetime of the mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StressState {
    pub tensile_stress_pa: f32,
    pub compressive_stress_pa: f32,
    pub shear_stress_pa: f32,
    pub von_mises_stress_pa: f32,
    pub yielding: bool,
    pub fractured: bool,
}

impl StressState {
    /// Zero the per-tick fields. `fractured` persists; cracks do not heal.
    pub fn reset(&mut self) {
        self.tensile_stress_pa = 0.0;
        self.compressive_stress_pa = 0.0;
        self.shear_stress_pa = 0.0;
        self.von_mises_stress_pa = 0.0;
        self.yielding = false;
    }

    /// Does any stress channel exceed the corresponding material strength?
    pub fn is_overstressed(&self, material: &StructuralMaterial) -> bool {
        self.tensile_stress_pa > material.tensile_strength_pa
            || self.compressive_stress_pa > material.compressive_strength_pa
            || self.von_mises_stress_pa > material.max_stress_pa
    }
}

/// Structural connection (beam, column) between two vertices.
///
/// Edges are adjacency indices into the vertex vector; the graph is undirected
/// for crack propagation but load transfer runs a -> b.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadBearingEdge {
    pub vertex_a: u32,
    pub vertex_b: u32,
    pub load_capacity_n: f32,
    pub current_load_n: f32,
    /// Structural failure if this edge breaks?
    pub is_critical: bool,
}

impl LoadBearingEdge {
    pub fn is_overloaded(&self) -> bool {
        self.current_load_n > self.load_capacity_n
    }

    /// 0.0 = unloaded, 1.0 = at capacity, > 1.0 = overloaded.
    pub fn load_ratio(&self) -> f32 {
        if self.load_capacity_n > 0.0 {
            self.current_load_n / self.load_capacity_n
        } else {
            0.0
        }
    }
}

/// Material assignment and structural physics state for a destructible mesh.
///
/// Vertex `i` uses `materials[i % materials.len()]`. All operations are total:
/// out-of-range indices are ignored, nothing panics.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct StructuralBody {
    pub materials: Vec<StructuralMaterial>,
    /// Mass per vertex (kg).
    pub vertex_masses: Vec<f32>,
    /// Load per vertex (N); derived each tick, not persisted.
    pub vertex_loads: Vec<f32>,
    pub vertex_stress: Vec<StressState>,
    pub load_bearing_edges: Vec<LoadBearingEdge>,
    pub total_mass_kg: f32,
}

impl StructuralBody {
    /// Masses default to 1 kg per vertex; loads and stress start zeroed.
    pub fn new(vertex_count: usize, default_material: StructuralMaterial) -> Self {
        Self {
            materials: vec![default_material],
            vertex_masses: vec![1.0; vertex_count],
            vertex_loads: vec![0.0; vertex_count],
            vertex_stress: vec![StressState::default(); vertex_count],
            load_bearing_edges: Vec::new(),
            total_mass_kg: vertex_count as f32,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_masses.len()
    }

    pub fn recompute_total_mass(&mut self) {
        self.total_mass_kg = self.vertex_masses.iter().sum();
    }

    /// Material for a vertex (modulo lookup).
    pub fn material_for(&self, vertex: u32) -> StructuralMaterial {
        if self.materials.is_empty() {
            return StructuralMaterial::stone();
        }
        self.materials[vertex as usize % self.materials.len()]
    }

    /// Stress state for a vertex, if in range.
    pub fn stress_for(&self, vertex: u32) -> Option<&StressState> {
        self.vertex_stress.get(vertex as usize)
    }

    /// Register a structural connection. Self-loops and out-of-range
    /// endpoints are ignored.
    pub fn add_load_bearing_edge(
        &mut self,
        vertex_a: u32,
        vertex_b: u32,
        load_capacity_n: f32,
        is_critical: bool,
    ) {
        let count = self.vertex_count() as u32;
        if vertex_a == vertex_b || vertex_a >= count || vertex_b >= count {
            return;
        }
        self.load_bearing_edges.push(LoadBearingEdge {
            vertex_a,
            vertex_b,
            load_capacity_n,
            current_load_n: 0.0,
            is_critical,
        });
    }

    /// Gravitational loads plus edge relaxation.
    ///
    /// Each of the fixed passes transfers half of the source vertex load along
    /// every edge a -> b, accumulating on b and recording the transfer as the
    /// edge's current load. Deliberately directional and non-conservative.
    pub fn calculate_loads(&mut self, gravity: Vec3) {
        let g = gravity.length();
        for (load, mass) in self.vertex_loads.iter_mut().zip(&self.vertex_masses) {
            *load = mass * g;
        }

        let count = self.vertex_loads.len() as u32;
        for _ in 0..LOAD_PROPAGATION_PASSES {
            for edge in &mut self.load_bearing_edges {
                if edge.vertex_a >= count || edge.vertex_b >= count {
                    continue;
                }
                let transferred = self.vertex_loads[edge.vertex_a as usize] * LOAD_TRANSFER_RATIO;
                self.vertex_loads[edge.vertex_b as usize] += transferred;
                edge.current_load_n = transferred;
            }
        }
    }

    /// Stress = load / area per vertex. Vertices with non-positive or missing
    /// area are skipped untouched.
    pub fn calculate_stress_from_loads(&mut self, vertex_areas: &[f32]) {
        if self.materials.is_empty() {
            return;
        }
        for i in 0..self.vertex_loads.len() {
            let Some(&area) = vertex_areas.get(i) else {
                continue;
            };
            if area <= 0.0 {
                continue;
            }
            let stress_pa = self.vertex_loads[i] / area;
            let material = self.material_for(i as u32);
            let state = &mut self.vertex_stress[i];
            state.compressive_stress_pa = stress_pa;
            state.von_mises_stress_pa = stress_pa;
            state.yielding = stress_pa > material.yield_strength_pa;
        }
    }

    /// Mark overstressed vertices as fractured and return their indices.
    pub fn check_structural_failure(&mut self) -> Vec<u32> {
        let mut failed = Vec::new();
        for i in 0..self.vertex_stress.len() {
            let material = self.material_for(i as u32);
            if self.vertex_stress[i].is_overstressed(&material) {
                self.vertex_stress[i].fractured = true;
                failed.push(i as u32);
            }
        }
        failed
    }

    /// Any critical load-bearing edge overloaded?
    pub fn has_critical_failure(&self) -> bool {
        self.load_bearing_edges
            .iter()
            .any(|e| e.is_critical && e.is_overloaded())
    }

    /// Projectile impact: kinetic energy converted to stress over a fixed
    /// penetration depth and contact area.
    ///
    /// Impacts pushing into the surface load the compressive channel; impacts
    /// pulling away load the tensile channel. Overstress fractures the vertex
    /// and, for brittle materials, spreads one hop through the edge graph.
    pub fn apply_impact(
        &mut self,
        vertex_index: u32,
        impact_direction: Vec3,
        kinetic_energy_j: f32,
        vertex_normal: Vec3,
    ) {
        let Some(state) = self.vertex_stress.get_mut(vertex_index as usize) else {
            return;
        };

        let impact_force_n = kinetic_energy_j / IMPACT_PENETRATION_DEPTH_M;
        let impact_stress_pa = impact_force_n / IMPACT_AREA_M2;

        if impact_direction.dot(vertex_normal) > 0.0 {
            state.compressive_stress_pa += impact_stress_pa;
        } else {
            state.tensile_stress_pa += impact_stress_pa;
        }
        state.von_mises_stress_pa = (state.tensile_stress_pa * state.tensile_stress_pa
            + state.compressive_stress_pa * state.compressive_stress_pa)
            .sqrt();

        let material = self.material_for(vertex_index);
        if self.vertex_stress[vertex_index as usize].is_overstressed(&material) {
            self.vertex_stress[vertex_index as usize].fractured = true;
            if material.brittle {
                self.propagate_fracture(vertex_index);
            }
        }
    }

    /// Spread a crack one hop from `origin` through adjacent edges.
    ///
    /// Depth-1 per call: multi-hop cracks emerge over ticks by re-entry, never
    /// by recursion, which keeps per-tick cost bounded and deterministic.
    pub fn propagate_fracture(&mut self, origin: u32) {
        let Some(origin_state) = self.vertex_stress.get(origin as usize).copied() else {
            return;
        };
        let material = self.material_for(origin);
        if !material.brittle || material.max_stress_pa <= 0.0 {
            return;
        }
        let intensity = origin_state.von_mises_stress_pa / material.max_stress_pa;
        if intensity <= CRACK_PROPAGATION_THRESHOLD {
            return;
        }

        let count = self.vertex_stress.len() as u32;
        let neighbors: Vec<u32> = self
            .load_bearing_edges
            .iter()
            .filter_map(|e| {
                if e.vertex_a == origin {
                    Some(e.vertex_b)
                } else if e.vertex_b == origin {
                    Some(e.vertex_a)
                } else {
                    None
                }
            })
            .filter(|&v| v < count)
            .collect();

        let transferred = origin_state.von_mises_stress_pa * CRACK_STRESS_TRANSFER;
        for adj in neighbors {
            let adj_material = self.material_for(adj);
            let state = &mut self.vertex_stress[adj as usize];
            if state.fractured {
                continue;
            }
            state.von_mises_stress_pa += transferred;
            if state.is_overstressed(&adj_material) {
                state.fractured = true;
            }
        }
    }

    /// Zero every per-tick stress field. Fractured flags persist.
    pub fn reset_stress(&mut self) {
        for state in &mut self.vertex_stress {
            state.reset();
        }
    }

    /// Indices of all currently fractured vertices.
    pub fn fractured_vertices(&self) -> Vec<u32> {
        self.vertex_stress
            .iter()
            .enumerate()
            .filter(|(_, s)| s.fractured)
            .map(|(i, _)| i as u32)
            .collect()
    }
}

/// Per-tick stress stage: reset, gravity loads, stress, impacts, failure scan.
///
/// Failed meshes are queued for the fracture generator together with the
/// first impact that hit them this tick.
pub fn analyze_structures(
    gravity: Res<StructuralGravity>,
    mut impacts: EventReader<MeshImpact>,
    mut queue: ResMut<FractureQueue>,
    mut structures: Query<(
        Entity,
        Option<&Transform>,
        &DestructibleMesh,
        &mut StructuralBody,
    )>,
) {
    let impacts: Vec<MeshImpact> = impacts.read().cloned().collect();

    for (entity, transform, mesh, mut body) in &mut structures {
        body.reset_stress();
        body.calculate_loads(gravity.0);
        let areas = mesh.vertex_areas();
        body.calculate_stress_from_loads(&areas);

        let tf = transform.copied().unwrap_or_default();
        let mut first_impact = None;
        for hit in impacts.iter().filter(|h| h.entity == entity) {
            let local_pos = tf.rotation.inverse() * (hit.impact.position - tf.translation);
            let local_dir = tf.rotation.inverse() * hit.impact.direction;
            if let Some(idx) = mesh.nearest_vertex(local_pos) {
                body.apply_impact(
                    idx as u32,
                    local_dir,
                    hit.impact.kinetic_energy_j,
                    mesh.normal_at(idx),
                );
                if first_impact.is_none() {
                    first_impact = Some(hit.impact.clone());
                }
            }
        }

        let failed = body.check_structural_failure();
        if !failed.is_empty() && !queue.contains(entity) {
            debug!(
                entity = ?entity,
                failed = failed.len(),
                "structural failure detected"
            );
            queue.push(PendingFracture {
                entity,
                failed_vertices: failed,
                impact: first_impact,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_body(len: usize, material: StructuralMaterial) -> StructuralBody {
        let mut body = StructuralBody::new(len, material);
        for i in 0..len as u32 - 1 {
            body.add_load_bearing_edge(i, i + 1, 10_000.0, false);
        }
        body
    }

    #[test]
    fn zero_gravity_means_zero_loads() {
        let mut body = chain_body(10, StructuralMaterial::concrete());
        body.calculate_loads(Vec3::ZERO);
        assert!(body.vertex_loads.iter().all(|&l| l == 0.0));
    }

    #[test]
    fn load_propagation_accumulates_downstream() {
        let mut body = StructuralBody::new(2, StructuralMaterial::concrete());
        body.add_load_bearing_edge(0, 1, 10_000.0, false);
        body.calculate_loads(Vec3::new(0.0, -10.0, 0.0));
        // Vertex 0 keeps its own load; transfers are not subtracted.
        assert_eq!(body.vertex_loads[0], 10.0);
        // Five passes each add 0.5 * load[0] onto vertex 1.
        assert!((body.vertex_loads[1] - (10.0 + 5.0 * 5.0)).abs() < 1e-4);
        assert_eq!(body.load_bearing_edges[0].current_load_n, 5.0);
    }

    #[test]
    fn stress_skips_zero_area_vertices() {
        let mut body = StructuralBody::new(2, StructuralMaterial::concrete());
        body.vertex_loads = vec![100.0, 100.0];
        body.calculate_stress_from_loads(&[0.0, 0.5]);
        assert_eq!(body.vertex_stress[0].compressive_stress_pa, 0.0);
        assert_eq!(body.vertex_stress[1].compressive_stress_pa, 200.0);
    }

    #[test]
    fn reset_preserves_fractured_flag() {
        let mut body = StructuralBody::new(1, StructuralMaterial::glass());
        body.vertex_stress[0].fractured = true;
        body.vertex_stress[0].von_mises_stress_pa = 1.0e9;
        body.vertex_stress[0].yielding = true;
        body.reset_stress();
        assert!(body.vertex_stress[0].fractured);
        assert!(!body.vertex_stress[0].yielding);
        assert_eq!(body.vertex_stress[0].von_mises_stress_pa, 0.0);
    }

    #[test]
    fn impact_into_surface_is_compressive() {
        let mut body = StructuralBody::new(1, StructuralMaterial::metal());
        // Direction aligned with the normal: pushing into the surface.
        body.apply_impact(0, Vec3::Y, 1.0, Vec3::Y);
        assert!(body.vertex_stress[0].compressive_stress_pa > 0.0);
        assert_eq!(body.vertex_stress[0].tensile_stress_pa, 0.0);

        let mut body = StructuralBody::new(1, StructuralMaterial::metal());
        body.apply_impact(0, Vec3::NEG_Y, 1.0, Vec3::Y);
        assert!(body.vertex_stress[0].tensile_stress_pa > 0.0);
        assert_eq!(body.vertex_stress[0].compressive_stress_pa, 0.0);
    }

    #[test]
    fn impact_out_of_range_is_ignored() {
        let mut body = StructuralBody::new(2, StructuralMaterial::glass());
        body.apply_impact(99, Vec3::Y, 1.0e9, Vec3::Y);
        assert!(body.fractured_vertices().is_empty());
    }

    #[test]
    fn propagation_is_depth_one_per_call() {
        // 500 J through 0.1 m and 0.001 m^2 => 5 GPa at vertex 0, far past
        // glass limits. The neighbor receives 30% (1.5 GPa > 1 GPa max) and
        // fractures too, but nothing past it is touched.
        let mut body = chain_body(10, StructuralMaterial::glass());
        body.apply_impact(0, Vec3::Y, 500.0, Vec3::Y);

        assert_eq!(
            body.fractured_vertices(),
            vec![0, 1],
            "one impact reaches one hop only"
        );
        assert_eq!(body.vertex_stress[2].von_mises_stress_pa, 0.0);

        // Re-entry from vertex 1 loads vertex 2 (0.45 GPa) without fracturing
        // it yet; repeated re-entry accumulates past the 1 GPa limit.
        body.propagate_fracture(1);
        assert_eq!(body.fractured_vertices(), vec![0, 1]);
        assert!(body.vertex_stress[2].von_mises_stress_pa > 0.0);
        body.propagate_fracture(1);
        body.propagate_fracture(1);
        assert_eq!(body.fractured_vertices(), vec![0, 1, 2]);
    }

    #[test]
    fn chain_fractures_progressively_without_reset() {
        let mut body = chain_body(10, StructuralMaterial::glass());
        body.apply_impact(0, Vec3::Y, 500.0, Vec3::Y);
        assert_eq!(body.fractured_vertices().len(), 2);

        // Each tick re-enters propagation from the vertices fractured before
        // the tick. The crack front advances at most one hop per tick and
        // eventually consumes the chain.
        let mut prev = 2;
        for _ in 0..200 {
            let front: Vec<u32> = body.fractured_vertices();
            for v in front {
                body.propagate_fracture(v);
            }
            let now = body.fractured_vertices().len();
            assert!(now >= prev, "fractured set is monotonic");
            assert!(now - prev <= 1, "at most one hop per tick");
            prev = now;
            if now == 10 {
                break;
            }
        }
        assert_eq!(prev, 10, "chain fully fractured");
    }

    #[test]
    fn ductile_material_does_not_propagate() {
        let mut body = chain_body(5, StructuralMaterial::metal());
        body.apply_impact(0, Vec3::Y, 500.0, Vec3::Y);
        // 5 GPa fractures even steel, but the crack must not spread.
        assert_eq!(body.fractured_vertices(), vec![0]);
    }

    #[test]
    fn check_failure_is_monotonic() {
        let mut body = StructuralBody::new(1, StructuralMaterial::brick());
        body.vertex_stress[0].tensile_stress_pa = 1.0e9;
        let failed = body.check_structural_failure();
        assert_eq!(failed, vec![0]);
        body.reset_stress();
        let failed_again = body.check_structural_failure();
        assert!(failed_again.is_empty(), "reset stress is not overstressed");
        assert!(body.vertex_stress[0].fractured, "flag survives the reset");
    }

    #[test]
    fn critical_edge_failure() {
        let mut body = StructuralBody::new(2, StructuralMaterial::concrete());
        body.add_load_bearing_edge(0, 1, 2.0, true);
        assert!(!body.has_critical_failure());
        body.calculate_loads(Vec3::new(0.0, -9.81, 0.0));
        // transfer = 0.5 * 9.81 > 2.0 capacity
        assert!(body.has_critical_failure());
    }

    #[test]
    fn self_loop_and_out_of_range_edges_rejected() {
        let mut body = StructuralBody::new(3, StructuralMaterial::stone());
        body.add_load_bearing_edge(1, 1, 100.0, false);
        body.add_load_bearing_edge(0, 17, 100.0, false);
        assert!(body.load_bearing_edges.is_empty());
    }
}
