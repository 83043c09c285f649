//! Headless demo: shatter a glass pane and watch the debris budget work.

use bevy::prelude::*;
use tracing::info;

use rubble_core::debris::DebrisManager;
use rubble_core::fracture::FractureGenerator;
use rubble_core::impact::{ImpactEvent, ImpactType, MeshImpact};
use rubble_core::logging;
use rubble_core::material::{FractureProperties, StructuralMaterial};
use rubble_core::mesh::DestructibleMesh;
use rubble_core::pipeline::DestructionPlugin;
use rubble_core::stress::StructuralBody;

fn main() {
    logging::init_tracing();

    let mut app = App::new();
    app.add_plugins(MinimalPlugins).add_plugins(DestructionPlugin);

    let mesh = DestructibleMesh::pane(1.0, 1.0, 0.02);
    let body = StructuralBody::new(mesh.vertices.len(), StructuralMaterial::glass());
    let pane = app
        .world_mut()
        .spawn((
            Transform::default(),
            mesh,
            body,
            FractureProperties::glass(),
        ))
        .id();

    app.world_mut().send_event(MeshImpact {
        entity: pane,
        impact: ImpactEvent::new(Vec3::ZERO, Vec3::NEG_Z, 500.0, ImpactType::Point),
    });

    for _ in 0..3 {
        app.update();
    }

    let world = app.world_mut();
    let generator = world.resource::<FractureGenerator>();
    let manager = world.resource::<DebrisManager>();
    info!(
        fractures = generator.fractures_performed,
        fragments = generator.fragments_spawned,
        tracked = manager.debris_count(),
        triangles = manager.total_triangles(),
        "demo complete"
    );
}
