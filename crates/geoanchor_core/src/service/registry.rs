//! Session object registry.
//!
//! # Responsibility
//! - Own the session's placed objects and their view pairs.
//! - Mediate create/remove against the backend and keep both visual
//!   surfaces and the anchor bindings in step with it.
//!
//! # Invariants
//! - Insertion is keyed by object id; a second insert of the same id is a
//!   no-op, whichever path (initial load or create) delivers it.
//! - A failed create inserts nothing.
//! - Remove tears down local state only after the backend acknowledged the
//!   delete.
//! - Nothing outside this type mutates `PlacedObject` or `ViewPair` state.

use crate::backend::{BackendError, ObjectBackend};
use crate::config::EngineConfig;
use crate::model::object::{DeviceIdentity, ObjectId, PlacedObject, PlacementRequest};
use crate::scene::freeze::{AnchorFreezeController, BindOutcome, FreezeOutcome};
use crate::scene::views::{ArScene, DualViewRenderer, EntityHandle, MapSurface, ViewPair};
use crate::service::condition::{DeleteRejection, EngineCondition};
use crate::service::ownership::OwnershipGate;
use crate::service::placement::PlacementDraft;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub object: PlacedObject,
    pub views: ViewPair,
}

/// Result of offering one object to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Inserted(ViewPair),
    Duplicate,
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub fetched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub invalid: usize,
    /// The list had already been fetched this session; nothing was done.
    pub already_loaded: bool,
}

pub struct ObjectRegistry<S: ArScene, M: MapSurface> {
    gate: OwnershipGate,
    renderer: DualViewRenderer,
    freeze: AnchorFreezeController,
    scene: S,
    map: M,
    entries: BTreeMap<ObjectId, RegistryEntry>,
    entity_index: HashMap<EntityHandle, ObjectId>,
    initial_load_done: bool,
}

impl<S: ArScene, M: MapSurface> ObjectRegistry<S, M> {
    pub fn new(identity: DeviceIdentity, config: &EngineConfig, scene: S, map: M) -> Self {
        Self {
            gate: OwnershipGate::new(identity.clone()),
            renderer: DualViewRenderer::new(config.presentation.clone(), identity),
            freeze: AnchorFreezeController::new(config.freeze),
            scene,
            map,
            entries: BTreeMap::new(),
            entity_index: HashMap::new(),
            initial_load_done: false,
        }
    }

    /// Fetches the shared object list once per session.
    ///
    /// Later calls return `already_loaded` without touching the backend. A
    /// failed fetch leaves the registry unloaded so the next trigger retries;
    /// objects that did arrive stay, since insertion is idempotent.
    pub fn load_initial(
        &mut self,
        backend: &dyn ObjectBackend,
    ) -> Result<LoadSummary, EngineCondition> {
        if self.initial_load_done {
            return Ok(LoadSummary {
                already_loaded: true,
                ..LoadSummary::default()
            });
        }

        let objects = backend.list().map_err(|err| {
            error!("event=registry_load module=registry status=error error={err}");
            EngineCondition::LoadFailed(err)
        })?;

        let mut summary = LoadSummary {
            fetched: objects.len(),
            ..LoadSummary::default()
        };
        for object in objects {
            match self.admit(object) {
                Admission::Inserted(_) => summary.inserted += 1,
                Admission::Duplicate => summary.duplicates += 1,
                Admission::Invalid(_) => summary.invalid += 1,
            }
        }
        self.initial_load_done = true;

        info!(
            "event=registry_load module=registry status=ok fetched={} inserted={} duplicates={} invalid={}",
            summary.fetched, summary.inserted, summary.duplicates, summary.invalid
        );
        Ok(summary)
    }

    /// Sends a placement request tagged with this device's identity and
    /// admits the returned record.
    pub fn create(
        &mut self,
        backend: &dyn ObjectBackend,
        draft: PlacementDraft,
    ) -> Result<PlacedObject, EngineCondition> {
        let request = PlacementRequest {
            coordinate: draft.coordinate,
            kind: draft.kind,
            asset: draft.asset,
            owner: self.gate.identity().clone(),
        };
        if let Err(err) = request.validate() {
            warn!(
                "event=registry_create module=registry status=error error_code=invalid_request error={err}"
            );
            return Err(EngineCondition::PlacementFailed(
                BackendError::InvalidRequest(err.to_string()),
            ));
        }

        let object = backend.place(&request).map_err(|err| {
            error!(
                "event=registry_create module=registry status=error kind={} error={err}",
                request.kind.as_str()
            );
            EngineCondition::PlacementFailed(err)
        })?;

        match self.admit(object.clone()) {
            Admission::Inserted(_) | Admission::Duplicate => {
                info!(
                    "event=registry_create module=registry status=ok object_id={} kind={} coordinate={}",
                    object.id,
                    object.kind.as_str(),
                    object.coordinate
                );
                Ok(object)
            }
            Admission::Invalid(reason) => Err(EngineCondition::PlacementFailed(
                BackendError::InvalidRequest(format!("backend returned invalid object: {reason}")),
            )),
        }
    }

    /// Deletes an object owned by this device.
    ///
    /// Order: ownership gate, then remote delete, then local teardown. A
    /// refusal at any step leaves local state as it was.
    pub fn remove(
        &mut self,
        backend: &dyn ObjectBackend,
        id: &ObjectId,
    ) -> Result<PlacedObject, EngineCondition> {
        let Some(entry) = self.entries.get(id) else {
            return Err(EngineCondition::DeleteRejected(
                DeleteRejection::UnknownObject(id.clone()),
            ));
        };
        if !self.gate.can_mutate(&entry.object) {
            info!("event=registry_remove module=registry status=rejected object_id={id} error_code=not_owner");
            return Err(EngineCondition::DeleteRejected(DeleteRejection::NotOwner(
                id.clone(),
            )));
        }

        if let Err(err) = backend.delete(id, self.gate.identity()) {
            warn!("event=registry_remove module=registry status=error object_id={id} error={err}");
            return Err(EngineCondition::DeleteRejected(DeleteRejection::Backend(
                err,
            )));
        }

        let Some(entry) = self.entries.remove(id) else {
            return Err(EngineCondition::DeleteRejected(
                DeleteRejection::UnknownObject(id.clone()),
            ));
        };
        self.entity_index.remove(&entry.views.ar_entity);
        self.freeze.release(id, &mut self.scene);
        self.renderer
            .withdraw(&entry.views, &mut self.scene, &mut self.map);

        info!("event=registry_remove module=registry status=ok object_id={id}");
        Ok(entry.object)
    }

    /// Shared insertion path: render both views and bind the anchor.
    pub fn admit(&mut self, object: PlacedObject) -> Admission {
        if self.entries.contains_key(&object.id) {
            debug!(
                "event=registry_admit module=registry status=duplicate object_id={}",
                object.id
            );
            return Admission::Duplicate;
        }
        if let Err(err) = object.validate() {
            warn!(
                "event=registry_admit module=registry status=error object_id={} error={err}",
                object.id
            );
            return Admission::Invalid(err.to_string());
        }

        let views = self
            .renderer
            .present(&object, &mut self.scene, &mut self.map);
        // Bind before returning to the event loop so the first projection
        // update cannot slip past unobserved.
        let bind = self
            .freeze
            .bind(object.id.clone(), object.kind, views.ar_entity, &mut self.scene);
        // A dead entity keeps its binding; `tick` reports it as lost.
        if matches!(bind, BindOutcome::EntityNotLive) {
            warn!(
                "event=registry_admit module=registry status=degraded object_id={} error_code=entity_not_live",
                object.id
            );
        }

        self.entity_index
            .insert(views.ar_entity, object.id.clone());
        self.entries.insert(
            object.id.clone(),
            RegistryEntry {
                object,
                views: views.clone(),
            },
        );
        Admission::Inserted(views)
    }

    pub fn on_projection_updated(&mut self, entity: EntityHandle) -> FreezeOutcome {
        self.freeze.on_projection_updated(entity, &mut self.scene)
    }

    /// Advances anchor retry timers; returns objects whose projection was
    /// just declared lost.
    pub fn tick(&mut self, now_ms: i64) -> Vec<ObjectId> {
        self.freeze.tick(now_ms, &mut self.scene)
    }

    /// Restarts anchor watching for an object reported lost.
    ///
    /// A live entity is resubscribed in place. An entity that left the scene
    /// (or never entered it) is replaced by a freshly spawned one and bound
    /// again.
    pub fn retry_anchor(&mut self, id: &ObjectId) -> bool {
        let Some((lost, entity)) = self
            .freeze
            .binding(id)
            .map(|binding| (binding.is_lost(), binding.entity()))
        else {
            return false;
        };
        if !lost {
            return false;
        }
        if self.scene.is_live(entity) {
            return self.freeze.retry(id, &mut self.scene);
        }
        let Some(entry) = self.entries.get_mut(id) else {
            return false;
        };

        self.freeze.release(id, &mut self.scene);
        self.entity_index.remove(&entry.views.ar_entity);
        let respawned = self.renderer.respawn_entity(&entry.object, &mut self.scene);
        entry.views.ar_entity = respawned;
        self.entity_index.insert(respawned, id.clone());

        let bind = self
            .freeze
            .bind(id.clone(), entry.object.kind, respawned, &mut self.scene);
        info!(
            "event=registry_respawn module=registry status={} object_id={id} entity={}",
            if matches!(bind, BindOutcome::EntityNotLive) { "error" } else { "ok" },
            respawned.0
        );
        matches!(
            bind,
            BindOutcome::Subscribed | BindOutcome::FrozenImmediately(_)
        )
    }

    pub fn get(&self, id: &ObjectId) -> Option<&PlacedObject> {
        self.entries.get(id).map(|entry| &entry.object)
    }

    pub fn view_pair(&self, id: &ObjectId) -> Option<&ViewPair> {
        self.entries.get(id).map(|entry| &entry.views)
    }

    /// Object behind an AR entity, for tap-to-delete.
    pub fn object_for_entity(&self, entity: EntityHandle) -> Option<&PlacedObject> {
        let id = self.entity_index.get(&entity)?;
        self.get(id)
    }

    /// Objects in id order.
    pub fn objects(&self) -> impl Iterator<Item = &PlacedObject> {
        self.entries.values().map(|entry| &entry.object)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.initial_load_done
    }

    pub fn can_mutate(&self, id: &ObjectId) -> bool {
        self.get(id)
            .is_some_and(|object| self.gate.can_mutate(object))
    }

    pub fn identity(&self) -> &DeviceIdentity {
        self.gate.identity()
    }

    pub fn freeze(&self) -> &AnchorFreezeController {
        &self.freeze
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    /// Host access to the scene, e.g. to forward projector activity.
    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }
}
