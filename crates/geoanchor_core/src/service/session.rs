//! Session-scoped engine state and event handlers.
//!
//! # Responsibility
//! - Own everything that lives for one session: location, placement intent,
//!   object registry, direction indicator and the backend handle.
//! - Turn host events (fixes, taps, uploads, heading and projection updates,
//!   timer ticks) into engine transitions.
//!
//! # Invariants
//! - Handlers never panic and never block; collaborator failures come back as
//!   `EngineCondition` values.
//! - The initial object load runs at most once successfully per session, no
//!   matter how many init paths trigger it.

use crate::backend::{AssetUpload, ObjectBackend};
use crate::config::EngineConfig;
use crate::geo::bearing::BearingIndicator;
use crate::geo::location::{LocationError, LocationFix, LocationProvider, PositionSource};
use crate::model::geo::GeoCoordinate;
use crate::model::object::{DeviceIdentity, ObjectId, ObjectKind, PlacedObject};
use crate::scene::freeze::FreezeOutcome;
use crate::scene::views::{ArScene, EntityHandle, MapSurface};
use crate::service::condition::{DeleteRejection, EngineCondition};
use crate::service::placement::{
    kind_for_media_type, PlacementDraft, PlacementIntent, PlacementStateMachine, PlacementStep,
    SelectableKind,
};
use crate::service::registry::{LoadSummary, ObjectRegistry};
use log::{info, warn};

const USER_MARKER_LABEL: &str = "You are here";

/// Outcome of a placement-related event.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementOutcome {
    Placed(PlacedObject),
    /// Coordinate recorded; the host should open the asset picker.
    AwaitingAsset(GeoCoordinate),
    /// Tap ignored: the user has to pick a kind first.
    SelectKindFirst,
    /// No location yet; the location-bound button cannot place.
    WaitingForLocation,
    /// Asset event with nothing waiting for it.
    Ignored,
}

/// What happened during `initialize`.
#[derive(Debug)]
pub struct InitReport {
    pub fix: LocationFix,
    pub conditions: Vec<EngineCondition>,
    pub load: Option<LoadSummary>,
}

pub struct Session<B: ObjectBackend, S: ArScene, M: MapSurface> {
    config: EngineConfig,
    backend: B,
    location: LocationProvider,
    placement: PlacementStateMachine,
    registry: ObjectRegistry<S, M>,
    indicator: BearingIndicator,
    map_initialized: bool,
}

impl<B: ObjectBackend, S: ArScene, M: MapSurface> Session<B, S, M> {
    pub fn new(
        config: EngineConfig,
        identity: DeviceIdentity,
        backend: B,
        scene: S,
        map: M,
    ) -> Self {
        info!(
            "event=session_start module=session status=ok identity={}",
            identity.redacted()
        );
        Self {
            location: LocationProvider::from_config(&config),
            registry: ObjectRegistry::new(identity, &config, scene, map),
            placement: PlacementStateMachine::new(),
            indicator: BearingIndicator::new(),
            map_initialized: false,
            config,
            backend,
        }
    }

    /// Resolves the device location (or fallback), sets up the map and
    /// loads the shared objects.
    pub fn initialize(&mut self, source: &mut dyn PositionSource) -> InitReport {
        let resolution = self.location.resolve(source);
        self.finish_fix(resolution.fix, resolution.failure)
    }

    /// Handles a location fix delivered by the host after `initialize`,
    /// e.g. a retry once permission was granted.
    pub fn on_location_fix(
        &mut self,
        result: Result<GeoCoordinate, LocationError>,
    ) -> InitReport {
        let resolution = self.location.accept(result);
        self.finish_fix(resolution.fix, resolution.failure)
    }

    fn finish_fix(&mut self, fix: LocationFix, failure: Option<LocationError>) -> InitReport {
        let mut conditions = Vec::new();
        if let Some(err) = failure {
            conditions.push(EngineCondition::LocationUnavailable(err));
        }

        if !self.map_initialized {
            let map = self.registry.map_mut();
            map.set_view(fix.coordinate, self.config.map_zoom);
            map.show_user_marker(fix.coordinate, USER_MARKER_LABEL);
            self.map_initialized = true;
        }
        self.indicator.set_viewer(fix.coordinate);

        let load = match self.registry.load_initial(&self.backend) {
            Ok(summary) => Some(summary),
            Err(condition) => {
                conditions.push(condition);
                None
            }
        };

        InitReport {
            fix,
            conditions,
            load,
        }
    }

    /// Retries the initial load if it has not succeeded yet.
    pub fn load_objects(&mut self) -> Result<LoadSummary, EngineCondition> {
        self.registry.load_initial(&self.backend)
    }

    pub fn select_kind(&mut self, kind: SelectableKind) -> PlacementStep {
        self.placement.select_kind(kind)
    }

    pub fn cancel_placement(&mut self) -> PlacementStep {
        self.placement.cancel()
    }

    pub fn map_tapped(
        &mut self,
        coordinate: GeoCoordinate,
    ) -> Result<PlacementOutcome, EngineCondition> {
        let step = self.placement.map_tapped(coordinate);
        self.apply_step(step)
    }

    /// Uploads the picked file and, on success, places the pending object.
    ///
    /// Files that are neither images nor videos are refused before anything
    /// reaches the backend.
    pub fn upload_asset(
        &mut self,
        upload: &AssetUpload,
    ) -> Result<PlacementOutcome, EngineCondition> {
        if self.placement.intent().coordinate.is_none() {
            return Ok(PlacementOutcome::Ignored);
        }
        if kind_for_media_type(&upload.media_type).is_none() {
            warn!(
                "event=session_upload module=session status=rejected error_code=unsupported_media_type media_type={}",
                upload.media_type
            );
            self.placement.cancel();
            return Err(EngineCondition::UnsupportedMediaType(
                upload.media_type.clone(),
            ));
        }

        match self.backend.upload(upload) {
            Ok(uploaded) => self.asset_uploaded(&uploaded.url, &uploaded.media_type),
            Err(err) => {
                warn!("event=session_upload module=session status=error error={err}");
                self.placement.upload_failed();
                Err(EngineCondition::UploadFailed(err))
            }
        }
    }

    /// Completes a pending media placement with an asset the host uploaded.
    pub fn asset_uploaded(
        &mut self,
        url: &str,
        media_type: &str,
    ) -> Result<PlacementOutcome, EngineCondition> {
        let step = self.placement.asset_uploaded(url, media_type);
        self.apply_step(step)
    }

    /// Location-bound button: places a cube at the current fix.
    pub fn place_here(&mut self) -> Result<PlacementOutcome, EngineCondition> {
        let Some(fix) = self.location.current() else {
            return Ok(PlacementOutcome::WaitingForLocation);
        };
        let draft = PlacementDraft {
            coordinate: fix.coordinate,
            kind: ObjectKind::Cube,
            asset: None,
        };
        self.registry
            .create(&self.backend, draft)
            .map(PlacementOutcome::Placed)
    }

    fn apply_step(&mut self, step: PlacementStep) -> Result<PlacementOutcome, EngineCondition> {
        match step {
            PlacementStep::Create(draft) => self
                .registry
                .create(&self.backend, draft)
                .map(PlacementOutcome::Placed),
            PlacementStep::PromptForAsset(coordinate) => {
                Ok(PlacementOutcome::AwaitingAsset(coordinate))
            }
            PlacementStep::SelectKindFirst => Ok(PlacementOutcome::SelectKindFirst),
            PlacementStep::UnsupportedMediaType(media_type) => {
                Err(EngineCondition::UnsupportedMediaType(media_type))
            }
            PlacementStep::Armed { .. }
            | PlacementStep::NotAwaitingAsset
            | PlacementStep::Cancelled(_) => Ok(PlacementOutcome::Ignored),
        }
    }

    /// Map marker delete button.
    pub fn delete(&mut self, id: &ObjectId) -> Result<PlacedObject, EngineCondition> {
        let removed = self.registry.remove(&self.backend, id)?;
        self.indicator.forget(id);
        Ok(removed)
    }

    /// AR tap-to-delete on an entity.
    pub fn delete_entity(
        &mut self,
        entity: EntityHandle,
    ) -> Result<PlacedObject, EngineCondition> {
        let Some(object) = self.registry.object_for_entity(entity) else {
            return Err(EngineCondition::DeleteRejected(
                DeleteRejection::UnknownEntity(entity),
            ));
        };
        let id = object.id.clone();
        self.delete(&id)
    }

    pub fn on_projection_updated(&mut self, entity: EntityHandle) -> FreezeOutcome {
        self.registry.on_projection_updated(entity)
    }

    /// Device heading in degrees; returns the arrow angle to draw.
    pub fn on_heading(&mut self, heading_deg: f64) -> Option<f64> {
        self.indicator.on_heading(heading_deg)
    }

    /// Points the direction indicator at `id`.
    pub fn point_at(&mut self, id: &ObjectId) -> Option<f64> {
        let coordinate = self.registry.get(id)?.coordinate;
        self.indicator.set_target(id.clone(), coordinate)
    }

    /// Timer tick from the host; reports anchors that gave up.
    pub fn tick(&mut self, now_ms: i64) -> Vec<EngineCondition> {
        self.registry
            .tick(now_ms)
            .into_iter()
            .map(|object_id| EngineCondition::ProjectionLost { object_id })
            .collect()
    }

    /// Restarts anchor watching for an object reported as lost.
    pub fn retry_anchor(&mut self, id: &ObjectId) -> bool {
        self.registry.retry_anchor(id)
    }

    pub fn placement_intent(&self) -> PlacementIntent {
        self.placement.intent()
    }

    pub fn location(&self) -> Option<LocationFix> {
        self.location.current()
    }

    pub fn identity(&self) -> &DeviceIdentity {
        self.registry.identity()
    }

    pub fn indicator(&self) -> &BearingIndicator {
        &self.indicator
    }

    pub fn registry(&self) -> &ObjectRegistry<S, M> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ObjectRegistry<S, M> {
        &mut self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
