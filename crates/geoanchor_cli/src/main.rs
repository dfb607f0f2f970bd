//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `geoanchor_core` linkage.
//! - Drive one headless session end to end: fallback location, initial
//!   load, cube placement, anchor freeze and bearing.

use geoanchor_core::{
    EngineConfig, GeoCoordinate, HeadlessMap, HeadlessScene, LocalPosition, LocationError,
    LocalBackend, PlacementOutcome, PositionSource, SelectableKind, Session,
};
use std::error::Error;
use std::time::Duration;

/// Position source of a machine without GPS.
struct NoGps;

impl PositionSource for NoGps {
    fn current_fix(&mut self, _timeout: Duration) -> Result<GeoCoordinate, LocationError> {
        Err(LocationError::Unavailable("no positioning hardware".to_string()))
    }
}

fn main() {
    println!("geoanchor_core ping={}", geoanchor_core::ping());
    println!("geoanchor_core version={}", geoanchor_core::core_version());

    if let Err(err) = run_demo() {
        eprintln!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn run_demo() -> Result<(), Box<dyn Error>> {
    let upload_dir = std::env::temp_dir().join("geoanchor_cli_uploads");
    let backend = LocalBackend::in_memory(upload_dir)?;
    let identity = backend.device_identity()?;
    let mut session = Session::new(
        EngineConfig::default(),
        identity,
        backend,
        HeadlessScene::new(),
        HeadlessMap::new(),
    );

    let report = session.initialize(&mut NoGps);
    println!(
        "location origin={:?} coordinate={}",
        report.fix.origin, report.fix.coordinate
    );
    for condition in &report.conditions {
        println!("condition code={} detail={condition}", condition.code());
    }

    session.select_kind(SelectableKind::Cube);
    let tap = GeoCoordinate::new(
        report.fix.coordinate.latitude + 0.0004,
        report.fix.coordinate.longitude + 0.0004,
    );
    let PlacementOutcome::Placed(object) = session.map_tapped(tap)? else {
        return Err("cube placement did not complete".into());
    };
    println!(
        "placed id={} kind={} at={}",
        object.id,
        object.kind.as_str(),
        object.coordinate
    );

    let entity = session
        .registry()
        .view_pair(&object.id)
        .map(|views| views.ar_entity)
        .ok_or("placed object has no AR entity")?;
    let notify = session
        .registry_mut()
        .scene_mut()
        .project(entity, LocalPosition::new(4.1, 1.6, -3.2));
    if notify {
        println!("freeze {:?}", session.on_projection_updated(entity));
    }

    match session.point_at(&object.id) {
        Some(angle) => println!("pointer angle={angle:.1}"),
        None => println!("pointer hidden"),
    }

    let removed = session.delete(&object.id)?;
    println!("deleted id={}", removed.id);
    Ok(())
}
