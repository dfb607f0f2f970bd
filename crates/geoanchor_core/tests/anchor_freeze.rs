use geoanchor_core::config::{FreezePolicy, OffsetMode};
use geoanchor_core::scene::{
    AnchorFreezeController, ArEntityDescriptor, ArScene, ArVisual, BindOutcome, EntityHandle,
    FreezeOutcome, HeadlessScene, LocalPosition,
};
use geoanchor_core::{GeoCoordinate, ObjectId, ObjectKind};

fn spawn(scene: &mut HeadlessScene, id: &str, kind: ObjectKind) -> EntityHandle {
    scene.spawn(&ArEntityDescriptor {
        object_id: ObjectId::new(id),
        kind,
        anchor: GeoCoordinate::new(12.9720, 77.5950),
        visual: ArVisual::Box {
            scale: 0.4,
            color: "red".to_string(),
        },
    })
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn first_update_freezes_with_replaced_height_and_later_updates_are_ignored() {
    let mut scene = HeadlessScene::new();
    let mut controller = AnchorFreezeController::new(FreezePolicy::default());
    let entity = spawn(&mut scene, "cube-1", ObjectKind::Cube);

    let bound = controller.bind(ObjectId::new("cube-1"), ObjectKind::Cube, entity, &mut scene);
    assert_eq!(bound, BindOutcome::Subscribed);
    assert_eq!(scene.subscription_count(entity), 1);

    assert!(scene.project(entity, LocalPosition::new(3.0, 1.5, -4.0)));
    let outcome = controller.on_projection_updated(entity, &mut scene);
    let expected = LocalPosition::new(3.0, -0.7, -4.0);
    assert_eq!(
        outcome,
        FreezeOutcome::Frozen {
            object_id: ObjectId::new("cube-1"),
            position: expected,
        }
    );
    assert_eq!(scene.subscription_count(entity), 0);
    assert_eq!(scene.local_position(entity), Some(expected));

    for step in 0..100 {
        let moved = LocalPosition::new(step as f64, step as f64, step as f64);
        assert!(!scene.project(entity, moved));
        assert_eq!(
            controller.on_projection_updated(entity, &mut scene),
            FreezeOutcome::AlreadyFrozen
        );
    }

    let binding = controller.binding(&ObjectId::new("cube-1")).unwrap();
    assert_eq!(binding.fixed_local_position(), Some(expected));
    assert!(!binding.is_subscribed());
    assert_eq!(scene.local_position(entity), Some(expected));
    // Captured value restored once, offset applied once, nothing after.
    assert_eq!(scene.entity(entity).unwrap().position_writes.len(), 2);
}

#[test]
fn detach_nudge_is_undone_and_additive_offset_uses_captured_height() {
    let mut scene = HeadlessScene::new();
    scene.nudge_on_detach(LocalPosition::new(0.5, 0.5, 0.5));
    let policy = FreezePolicy {
        offset_mode: OffsetMode::Additive,
        ..FreezePolicy::default()
    };
    let mut controller = AnchorFreezeController::new(policy);
    let entity = spawn(&mut scene, "image-1", ObjectKind::Image);
    controller.bind(
        ObjectId::new("image-1"),
        ObjectKind::Image,
        entity,
        &mut scene,
    );

    scene.project(entity, LocalPosition::new(1.0, 1.0, 2.0));
    controller.on_projection_updated(entity, &mut scene);

    let fixed = scene.local_position(entity).unwrap();
    assert_close(fixed.x, 1.0);
    assert_close(fixed.y, 1.2);
    assert_close(fixed.z, 2.0);
    let writes = &scene.entity(entity).unwrap().position_writes;
    assert_eq!(writes[0], LocalPosition::new(1.0, 1.0, 2.0));
}

#[test]
fn entity_projected_before_bind_is_frozen_at_bind_time() {
    let mut scene = HeadlessScene::new();
    let mut controller = AnchorFreezeController::new(FreezePolicy::default());
    let entity = spawn(&mut scene, "video-1", ObjectKind::Video);

    // Nobody is listening yet, so the host would not forward this update.
    assert!(!scene.project(entity, LocalPosition::new(0.0, 2.0, -1.0)));

    let bound = controller.bind(
        ObjectId::new("video-1"),
        ObjectKind::Video,
        entity,
        &mut scene,
    );
    assert_eq!(
        bound,
        BindOutcome::FrozenImmediately(LocalPosition::new(0.0, 0.4, -1.0))
    );
    assert_eq!(scene.subscription_count(entity), 0);
    assert_eq!(controller.pending_count(), 0);
}

#[test]
fn bind_refuses_dead_entities_and_duplicates() {
    let mut scene = HeadlessScene::new();
    let mut controller = AnchorFreezeController::new(FreezePolicy::default());

    let outcome = controller.bind(
        ObjectId::new("ghost"),
        ObjectKind::Cube,
        EntityHandle(999),
        &mut scene,
    );
    assert_eq!(outcome, BindOutcome::EntityNotLive);
    let ghost = controller.binding(&ObjectId::new("ghost")).unwrap();
    assert!(!ghost.is_subscribed());
    assert!(!ghost.is_frozen());

    let entity = spawn(&mut scene, "cube-1", ObjectKind::Cube);
    controller.bind(ObjectId::new("cube-1"), ObjectKind::Cube, entity, &mut scene);
    let again = controller.bind(ObjectId::new("cube-1"), ObjectKind::Cube, entity, &mut scene);
    assert_eq!(again, BindOutcome::AlreadyBound);
    assert_eq!(scene.subscription_count(entity), 1);
}

#[test]
fn missing_updates_are_resubscribed_then_reported_lost_once() {
    let mut scene = HeadlessScene::new();
    scene.refuse_subscriptions(true);
    let mut controller = AnchorFreezeController::new(FreezePolicy::default());
    let entity = spawn(&mut scene, "cube-1", ObjectKind::Cube);
    let id = ObjectId::new("cube-1");

    assert_eq!(
        controller.bind(id.clone(), ObjectKind::Cube, entity, &mut scene),
        BindOutcome::SubscriptionRefused
    );

    assert!(controller.tick(0, &mut scene).is_empty());
    assert!(controller.tick(4_999, &mut scene).is_empty());
    for (now, attempts) in [(5_000, 1), (10_000, 2), (15_000, 3)] {
        assert!(controller.tick(now, &mut scene).is_empty());
        assert_eq!(controller.binding(&id).unwrap().resubscribe_attempts(), attempts);
    }

    assert_eq!(controller.tick(20_000, &mut scene), vec![id.clone()]);
    assert!(controller.binding(&id).unwrap().is_lost());
    assert!(controller.tick(40_000, &mut scene).is_empty());

    scene.refuse_subscriptions(false);
    assert!(controller.retry(&id, &mut scene));
    assert!(!controller.binding(&id).unwrap().is_lost());
    assert!(scene.project(entity, LocalPosition::new(1.0, 0.0, 1.0)));
    assert!(matches!(
        controller.on_projection_updated(entity, &mut scene),
        FreezeOutcome::Frozen { .. }
    ));
    assert!(!controller.retry(&id, &mut scene));
}

#[test]
fn dead_entity_is_reported_lost_once_and_cannot_be_retried_in_place() {
    let mut scene = HeadlessScene::new();
    scene.drop_spawns(true);
    let mut controller = AnchorFreezeController::new(FreezePolicy::default());
    let entity = spawn(&mut scene, "cube-1", ObjectKind::Cube);
    let id = ObjectId::new("cube-1");

    assert_eq!(
        controller.bind(id.clone(), ObjectKind::Cube, entity, &mut scene),
        BindOutcome::EntityNotLive
    );

    let mut lost = Vec::new();
    for now in (0..=100_000).step_by(5_000) {
        lost.extend(controller.tick(now, &mut scene));
    }
    assert_eq!(lost, vec![id.clone()]);
    let binding = controller.binding(&id).unwrap();
    assert!(binding.is_lost());
    assert_eq!(binding.resubscribe_attempts(), 0);
    assert_eq!(scene.subscription_count(entity), 0);

    assert!(!controller.retry(&id, &mut scene));
    assert!(controller.binding(&id).unwrap().is_lost());
}

#[test]
fn frozen_bindings_are_never_resubscribed() {
    let mut scene = HeadlessScene::new();
    let mut controller = AnchorFreezeController::new(FreezePolicy::default());
    let entity = spawn(&mut scene, "cube-1", ObjectKind::Cube);
    controller.bind(ObjectId::new("cube-1"), ObjectKind::Cube, entity, &mut scene);
    scene.project(entity, LocalPosition::new(0.0, 0.0, 0.0));
    controller.on_projection_updated(entity, &mut scene);

    for now in [0, 10_000, 20_000, 30_000, 40_000] {
        assert!(controller.tick(now, &mut scene).is_empty());
    }
    assert_eq!(scene.subscription_count(entity), 0);
}

#[test]
fn release_drops_subscription_and_forgets_entity() {
    let mut scene = HeadlessScene::new();
    let mut controller = AnchorFreezeController::new(FreezePolicy::default());
    let entity = spawn(&mut scene, "cube-1", ObjectKind::Cube);
    let id = ObjectId::new("cube-1");
    controller.bind(id.clone(), ObjectKind::Cube, entity, &mut scene);

    let released = controller.release(&id, &mut scene).unwrap();
    assert!(!released.is_frozen());
    assert_eq!(scene.subscription_count(entity), 0);
    assert_eq!(
        controller.on_projection_updated(entity, &mut scene),
        FreezeOutcome::UnknownEntity
    );
    assert!(controller.release(&id, &mut scene).is_none());
}
