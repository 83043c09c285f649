//! Debris lifecycle management: global entity/triangle budgets, distance LOD,
//! proximity merging, age eviction.
//!
//! The manager tracks entity ids plus registration records, never component
//! references; liveness is re-checked against the world at every touch.
//! Records live in registration order so every scan (merge pairs, eviction
//! ties) is deterministic.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fracture::piece::DebrisPiece;
use crate::pipeline::ViewerPosition;

/// Budget and LOD tuning for the debris manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebrisConfig {
    pub max_entities: usize,
    pub max_triangles: u64,
    /// Seconds before debris is evicted; 0 disables age eviction.
    pub lifetime_s: f32,
    /// Distance (m) under which two debris pieces merge.
    pub merge_distance: f32,
    pub lod_distance_near: f32,
    pub lod_distance_far: f32,
    /// Triangle multiplier published at/inside the near distance.
    pub lod_multiplier_near: f32,
    /// Triangle multiplier published at/beyond the far distance.
    pub lod_multiplier_far: f32,
}

impl Default for DebrisConfig {
    fn default() -> Self {
        Self {
            max_entities: 500,
            max_triangles: 50_000,
            lifetime_s: 30.0,
            merge_distance: 0.5,
            lod_distance_near: 20.0,
            lod_distance_far: 50.0,
            lod_multiplier_near: 1.0,
            lod_multiplier_far: 0.25,
        }
    }
}

impl DebrisConfig {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

/// Published LOD factor in [0, 1]; the renderer decides what to do with it.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct DebrisLod(pub f32);

/// Tracking record for one registered debris entity.
#[derive(Debug, Clone)]
pub struct DebrisRecord {
    pub entity: Entity,
    pub creation_time: f32,
    pub triangle_count: u32,
    pub position: Vec3,
    pub distance_from_camera: f32,
    pub merged: bool,
    pub use_gpu_instancing: bool,
}

/// Enforces the global debris budget over everything the fracture generator
/// produces.
#[derive(Resource, Debug)]
pub struct DebrisManager {
    config: DebrisConfig,
    records: Vec<DebrisRecord>,
    total_triangles: u64,
    clock: f32,
    evictions: u64,
}

impl Default for DebrisManager {
    fn default() -> Self {
        Self::new(DebrisConfig::default())
    }
}

impl DebrisManager {
    pub fn new(config: DebrisConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
            total_triangles: 0,
            clock: 0.0,
            evictions: 0,
        }
    }

    pub fn config(&self) -> &DebrisConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DebrisConfig {
        &mut self.config
    }

    /// Track a new debris entity. Totals adjust immediately; budget
    /// enforcement happens on the next `update`.
    pub fn register(&mut self, entity: Entity, triangle_count: u32, position: Vec3) {
        self.records.push(DebrisRecord {
            entity,
            creation_time: self.clock,
            triangle_count,
            position,
            distance_from_camera: 0.0,
            merged: false,
            use_gpu_instancing: false,
        });
        self.total_triangles += triangle_count as u64;
    }

    /// Stop tracking an entity without destroying it.
    pub fn unregister(&mut self, entity: Entity) {
        if let Some(idx) = self.records.iter().position(|r| r.entity == entity) {
            self.total_triangles -= self.records[idx].triangle_count as u64;
            self.records.remove(idx);
        }
    }

    pub fn debris_count(&self) -> usize {
        self.records.len()
    }

    pub fn total_triangles(&self) -> u64 {
        self.total_triangles
    }

    pub fn is_budget_exceeded(&self) -> bool {
        self.records.len() > self.config.max_entities
            || self.total_triangles > self.config.max_triangles
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    /// Tracked entity ids in registration order.
    pub fn tracked_entities(&self) -> Vec<Entity> {
        self.records.iter().map(|r| r.entity).collect()
    }

    /// Per-tick maintenance in strict order: clock, transform refresh, age
    /// eviction, LOD publication, proximity merge, budget eviction.
    pub fn update(&mut self, world: &mut World, dt: f32) {
        self.clock += dt;
        self.refresh_transforms(world);
        if self.config.lifetime_s > 0.0 {
            self.evict_expired(world);
        }
        self.publish_lod(world);
        self.merge_nearby(world);
        self.enforce_budget(world);
    }

    /// Destroy and forget everything tracked.
    pub fn clear(&mut self, world: &mut World) {
        for record in self.records.drain(..) {
            Self::destroy(world, record.entity);
        }
        self.total_triangles = 0;
    }

    /// Refresh positions and camera distances; entities destroyed behind the
    /// manager's back fall out of tracking here.
    fn refresh_transforms(&mut self, world: &mut World) {
        let camera = world
            .get_resource::<ViewerPosition>()
            .map(|v| v.0)
            .unwrap_or(Vec3::ZERO);

        let mut dropped: u64 = 0;
        self.records.retain_mut(|record| {
            if world.get_entity(record.entity).is_err() {
                dropped += record.triangle_count as u64;
                return false;
            }
            if let Some(transform) = world.get::<Transform>(record.entity) {
                record.position = transform.translation;
            }
            record.distance_from_camera = camera.distance(record.position);
            true
        });
        self.total_triangles -= dropped;
    }

    fn evict_expired(&mut self, world: &mut World) {
        let lifetime = self.config.lifetime_s;
        let clock = self.clock;
        let mut freed: u64 = 0;
        let mut evicted: u64 = 0;
        self.records.retain(|record| {
            if clock - record.creation_time > lifetime {
                Self::destroy(world, record.entity);
                freed += record.triangle_count as u64;
                evicted += 1;
                false
            } else {
                true
            }
        });
        self.total_triangles -= freed;
        self.evictions += evicted;
        if evicted > 0 {
            debug!(evicted, "age eviction");
        }
    }

    fn publish_lod(&mut self, world: &mut World) {
        let near = self.config.lod_distance_near;
        let far = self.config.lod_distance_far;
        for record in &self.records {
            let t = if far > near {
                ((record.distance_from_camera - near) / (far - near)).clamp(0.0, 1.0)
            } else if record.distance_from_camera >= far {
                1.0
            } else {
                0.0
            };
            let factor = self.config.lod_multiplier_near
                + (self.config.lod_multiplier_far - self.config.lod_multiplier_near) * t;
            if let Ok(mut entity) = world.get_entity_mut(record.entity) {
                entity.insert(DebrisLod(factor));
            }
        }
    }

    /// O(n^2) pairwise merge. Triangles of the later registration transfer to
    /// the earlier one; the running total is intentionally NOT decremented
    /// (triangles moved, not removed).
    fn merge_nearby(&mut self, world: &mut World) {
        let n = self.records.len();
        for i in 0..n {
            if self.records[i].merged {
                continue;
            }
            for j in (i + 1)..n {
                if self.records[j].merged {
                    continue;
                }
                let distance = self.records[i].position.distance(self.records[j].position);
                if distance <= self.config.merge_distance {
                    let moved = self.records[j].triangle_count;
                    self.records[i].triangle_count += moved;
                    self.records[j].merged = true;
                }
            }
        }

        let mut survivors = Vec::with_capacity(n);
        for record in self.records.drain(..) {
            if record.merged {
                if let Some(mut piece) = world.get_mut::<DebrisPiece>(record.entity) {
                    piece.merged = true;
                }
                Self::destroy(world, record.entity);
            } else {
                survivors.push(record);
            }
        }
        self.records = survivors;
    }

    /// Evict oldest-first until both budgets hold. Registration order breaks
    /// creation-time ties.
    fn enforce_budget(&mut self, world: &mut World) {
        while self.records.len() > self.config.max_entities
            || self.total_triangles > self.config.max_triangles
        {
            let Some(oldest) = self
                .records
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    a.creation_time
                        .partial_cmp(&b.creation_time)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(idx, _)| idx)
            else {
                break;
            };
            let record = self.records.remove(oldest);
            Self::destroy(world, record.entity);
            self.total_triangles -= record.triangle_count as u64;
            self.evictions += 1;
        }
    }

    /// Destroying a no-longer-valid entity is a no-op.
    fn destroy(world: &mut World, entity: Entity) -> bool {
        if world.get_entity(entity).is_ok() {
            world.despawn(entity)
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_at(world: &mut World, position: Vec3) -> Entity {
        world.spawn(Transform::from_translation(position)).id()
    }

    fn manager(max_entities: usize, max_triangles: u64) -> DebrisManager {
        DebrisManager::new(DebrisConfig {
            max_entities,
            max_triangles,
            lifetime_s: 0.0,
            merge_distance: 0.0,
            ..Default::default()
        })
    }

    #[test]
    fn budget_eviction_removes_oldest_first() {
        let mut world = World::new();
        let mut mgr = manager(10, 200);

        let mut spawned = Vec::new();
        for i in 0..15 {
            let e = spawn_at(&mut world, Vec3::new(i as f32 * 10.0, 0.0, 0.0));
            mgr.register(e, 20, Vec3::new(i as f32 * 10.0, 0.0, 0.0));
            mgr.update(&mut world, 0.1); // advance clock between registrations
            spawned.push(e);
        }

        // After the last update both budgets hold.
        assert_eq!(mgr.debris_count(), 10);
        assert_eq!(mgr.total_triangles(), 200);
        assert!(!mgr.is_budget_exceeded());
        // The five earliest registrations were evicted.
        let tracked = mgr.tracked_entities();
        for e in &spawned[..5] {
            assert!(!tracked.contains(e));
            assert!(world.get_entity(*e).is_err());
        }
        for e in &spawned[5..] {
            assert!(tracked.contains(e));
        }
    }

    #[test]
    fn merge_transfers_triangles_without_total_decrement() {
        let mut world = World::new();
        let mut mgr = DebrisManager::new(DebrisConfig {
            merge_distance: 0.5,
            lifetime_s: 0.0,
            ..Default::default()
        });

        let a = spawn_at(&mut world, Vec3::ZERO);
        let b = spawn_at(&mut world, Vec3::new(0.1, 0.0, 0.0));
        mgr.register(a, 30, Vec3::ZERO);
        mgr.register(b, 40, Vec3::new(0.1, 0.0, 0.0));
        assert_eq!(mgr.total_triangles(), 70);

        mgr.update(&mut world, 0.016);

        assert_eq!(mgr.debris_count(), 1, "exactly one of the pair survives");
        assert_eq!(mgr.tracked_entities(), vec![a], "earlier registration wins");
        assert_eq!(mgr.total_triangles(), 70, "merge does not decrement totals");
        assert!(world.get_entity(b).is_err());
        let tracked = &mgr.records[0];
        assert_eq!(tracked.triangle_count, 70);
    }

    #[test]
    fn distant_pieces_do_not_merge() {
        let mut world = World::new();
        let mut mgr = DebrisManager::new(DebrisConfig {
            merge_distance: 0.5,
            lifetime_s: 0.0,
            ..Default::default()
        });
        let a = spawn_at(&mut world, Vec3::ZERO);
        let b = spawn_at(&mut world, Vec3::new(10.0, 0.0, 0.0));
        mgr.register(a, 10, Vec3::ZERO);
        mgr.register(b, 10, Vec3::new(10.0, 0.0, 0.0));
        mgr.update(&mut world, 0.016);
        assert_eq!(mgr.debris_count(), 2);
    }

    #[test]
    fn age_eviction_respects_lifetime() {
        let mut world = World::new();
        let mut mgr = DebrisManager::new(DebrisConfig {
            lifetime_s: 1.0,
            merge_distance: 0.0,
            ..Default::default()
        });
        let old = spawn_at(&mut world, Vec3::ZERO);
        mgr.register(old, 10, Vec3::ZERO);

        mgr.update(&mut world, 0.5);
        let young = spawn_at(&mut world, Vec3::new(5.0, 0.0, 0.0));
        mgr.register(young, 10, Vec3::new(5.0, 0.0, 0.0));

        // old age = 1.1 > 1.0, young age = 0.6
        mgr.update(&mut world, 0.6);
        assert_eq!(mgr.tracked_entities(), vec![young]);
        assert!(world.get_entity(old).is_err());
        assert_eq!(mgr.total_triangles(), 10);
    }

    #[test]
    fn fresh_debris_is_not_age_evicted() {
        let mut world = World::new();
        let mut mgr = DebrisManager::new(DebrisConfig {
            lifetime_s: 10.0,
            merge_distance: 0.0,
            ..Default::default()
        });
        let e = spawn_at(&mut world, Vec3::ZERO);
        mgr.register(e, 10, Vec3::ZERO);
        mgr.update(&mut world, 0.0);
        assert_eq!(mgr.debris_count(), 1, "age 0 never exceeds a lifetime");
    }

    #[test]
    fn externally_destroyed_entities_fall_out_of_tracking() {
        let mut world = World::new();
        let mut mgr = manager(10, 1000);
        let e = spawn_at(&mut world, Vec3::ZERO);
        mgr.register(e, 25, Vec3::ZERO);
        world.despawn(e);
        mgr.update(&mut world, 0.016);
        assert_eq!(mgr.debris_count(), 0);
        assert_eq!(mgr.total_triangles(), 0);
    }

    #[test]
    fn lod_factor_interpolates_with_distance() {
        let mut world = World::new();
        world.insert_resource(ViewerPosition(Vec3::ZERO));
        let mut mgr = DebrisManager::new(DebrisConfig {
            lod_distance_near: 10.0,
            lod_distance_far: 20.0,
            lod_multiplier_near: 1.0,
            lod_multiplier_far: 0.25,
            merge_distance: 0.0,
            lifetime_s: 0.0,
            ..Default::default()
        });

        let near = spawn_at(&mut world, Vec3::new(5.0, 0.0, 0.0));
        let mid = spawn_at(&mut world, Vec3::new(15.0, 0.0, 0.0));
        let far = spawn_at(&mut world, Vec3::new(100.0, 0.0, 0.0));
        mgr.register(near, 10, Vec3::ZERO);
        mgr.register(mid, 10, Vec3::ZERO);
        mgr.register(far, 10, Vec3::ZERO);
        mgr.update(&mut world, 0.016);

        let lod = |e| world.get::<DebrisLod>(e).unwrap().0;
        assert!((lod(near) - 1.0).abs() < 1e-5);
        assert!((lod(mid) - 0.625).abs() < 1e-5);
        assert!((lod(far) - 0.25).abs() < 1e-5);
    }

    #[test]
    fn identical_sequences_produce_identical_tracking() {
        let mut world_a = World::new();
        let mut world_b = World::new();
        let mut mgr_a = manager(5, 120);
        let mut mgr_b = manager(5, 120);

        for (world, mgr) in [(&mut world_a, &mut mgr_a), (&mut world_b, &mut mgr_b)] {
            for i in 0..8 {
                let pos = Vec3::new(i as f32 * 3.0, 0.0, 0.0);
                let e = spawn_at(world, pos);
                mgr.register(e, 20, pos);
                mgr.update(world, 0.25);
            }
        }

        // Same registration order and timings => same record positions and
        // counts, entity-by-entity.
        assert_eq!(mgr_a.debris_count(), mgr_b.debris_count());
        assert_eq!(mgr_a.total_triangles(), mgr_b.total_triangles());
        let snapshot = |mgr: &DebrisManager| {
            mgr.records
                .iter()
                .map(|r| (r.creation_time.to_bits(), r.triangle_count, r.position.x.to_bits()))
                .collect::<Vec<_>>()
        };
        assert_eq!(snapshot(&mgr_a), snapshot(&mgr_b));
    }

    #[test]
    fn unregister_releases_budget_without_destroying() {
        let mut world = World::new();
        let mut mgr = manager(10, 100);
        let e = spawn_at(&mut world, Vec3::ZERO);
        mgr.register(e, 60, Vec3::ZERO);
        mgr.unregister(e);
        assert_eq!(mgr.debris_count(), 0);
        assert_eq!(mgr.total_triangles(), 0);
        assert!(world.get_entity(e).is_ok(), "entity itself survives");
    }

    #[test]
    fn config_json_roundtrip() {
        let config = DebrisConfig {
            max_entities: 64,
            max_triangles: 4096,
            ..Default::default()
        };
        let parsed = DebrisConfig::from_json(&config.to_json()).expect("round-trip");
        assert_eq!(parsed, config);
    }
}
