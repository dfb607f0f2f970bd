//! In-memory AR scene and map.
//!
//! Used by the CLI smoke run and by tests: both surfaces record what the
//! engine did to them, and `HeadlessScene::project` stands in for the
//! geographic projector moving an entity.

use crate::model::geo::GeoCoordinate;
use crate::model::object::ObjectId;
use crate::scene::views::{
    ArEntityDescriptor, ArScene, EntityHandle, LocalPosition, MapMarkerDescriptor, MapSurface,
    MarkerHandle, SubscriptionHandle,
};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct HeadlessEntity {
    pub descriptor: ArEntityDescriptor,
    pub position: Option<LocalPosition>,
    pub detached: bool,
    /// Every position write made through `set_local_position`.
    pub position_writes: Vec<LocalPosition>,
}

#[derive(Debug, Default)]
pub struct HeadlessScene {
    next_handle: u64,
    entities: BTreeMap<EntityHandle, HeadlessEntity>,
    subscriptions: HashMap<SubscriptionHandle, EntityHandle>,
    refuse_subscriptions: bool,
    drop_spawns: bool,
    detach_nudge: Option<LocalPosition>,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `subscribe_projection` return `None`, like a scene whose
    /// projector has not started yet.
    pub fn refuse_subscriptions(&mut self, refuse: bool) {
        self.refuse_subscriptions = refuse;
    }

    /// Makes `spawn` hand out handles for entities that never enter the
    /// scene, like a scene that failed to load the entity's asset.
    pub fn drop_spawns(&mut self, drop: bool) {
        self.drop_spawns = drop;
    }

    /// Makes `detach_projection` move the entity by `nudge`, mimicking
    /// projectors that write one last transform while detaching.
    pub fn nudge_on_detach(&mut self, nudge: LocalPosition) {
        self.detach_nudge = Some(nudge);
    }

    /// Simulates the projector placing `entity` at `position`.
    ///
    /// Detached entities are not moved. Returns whether a subscriber should
    /// be notified, i.e. whether the host would forward this update.
    pub fn project(&mut self, entity: EntityHandle, position: LocalPosition) -> bool {
        let Some(state) = self.entities.get_mut(&entity) else {
            return false;
        };
        if state.detached {
            return false;
        }
        state.position = Some(position);
        self.subscriptions.values().any(|subscribed| *subscribed == entity)
    }

    /// Removes an entity behind the engine's back.
    pub fn drop_externally(&mut self, entity: EntityHandle) -> bool {
        self.subscriptions.retain(|_, subscribed| *subscribed != entity);
        self.entities.remove(&entity).is_some()
    }

    pub fn entity(&self, entity: EntityHandle) -> Option<&HeadlessEntity> {
        self.entities.get(&entity)
    }

    pub fn entity_for(&self, object_id: &ObjectId) -> Option<EntityHandle> {
        self.entities
            .iter()
            .find(|(_, state)| &state.descriptor.object_id == object_id)
            .map(|(handle, _)| *handle)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn subscription_count(&self, entity: EntityHandle) -> usize {
        self.subscriptions
            .values()
            .filter(|subscribed| **subscribed == entity)
            .count()
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl ArScene for HeadlessScene {
    fn spawn(&mut self, descriptor: &ArEntityDescriptor) -> EntityHandle {
        let handle = EntityHandle(self.next());
        if self.drop_spawns {
            return handle;
        }
        self.entities.insert(
            handle,
            HeadlessEntity {
                descriptor: descriptor.clone(),
                position: None,
                detached: false,
                position_writes: Vec::new(),
            },
        );
        handle
    }

    fn remove(&mut self, entity: EntityHandle) -> bool {
        self.drop_externally(entity)
    }

    fn is_live(&self, entity: EntityHandle) -> bool {
        self.entities.contains_key(&entity)
    }

    fn has_projected(&self, entity: EntityHandle) -> bool {
        self.entities
            .get(&entity)
            .is_some_and(|state| state.position.is_some())
    }

    fn subscribe_projection(&mut self, entity: EntityHandle) -> Option<SubscriptionHandle> {
        if self.refuse_subscriptions || !self.entities.contains_key(&entity) {
            return None;
        }
        let handle = SubscriptionHandle(self.next());
        self.subscriptions.insert(handle, entity);
        Some(handle)
    }

    fn unsubscribe_projection(&mut self, subscription: SubscriptionHandle) {
        self.subscriptions.remove(&subscription);
    }

    fn detach_projection(&mut self, entity: EntityHandle) {
        let nudge = self.detach_nudge;
        if let Some(state) = self.entities.get_mut(&entity) {
            state.detached = true;
            if let (Some(nudge), Some(position)) = (nudge, state.position) {
                state.position = Some(LocalPosition::new(
                    position.x + nudge.x,
                    position.y + nudge.y,
                    position.z + nudge.z,
                ));
            }
        }
    }

    fn local_position(&self, entity: EntityHandle) -> Option<LocalPosition> {
        self.entities.get(&entity).and_then(|state| state.position)
    }

    fn set_local_position(&mut self, entity: EntityHandle, position: LocalPosition) {
        if let Some(state) = self.entities.get_mut(&entity) {
            state.position = Some(position);
            state.position_writes.push(position);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessMarker {
    pub handle: MarkerHandle,
    pub descriptor: MapMarkerDescriptor,
}

#[derive(Debug, Default)]
pub struct HeadlessMap {
    next_handle: u64,
    markers: BTreeMap<ObjectId, HeadlessMarker>,
    user_marker: Option<(GeoCoordinate, String)>,
    view: Option<(GeoCoordinate, u8)>,
}

impl HeadlessMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(&self, key: &ObjectId) -> Option<&HeadlessMarker> {
        self.markers.get(key)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn user_marker(&self) -> Option<&(GeoCoordinate, String)> {
        self.user_marker.as_ref()
    }

    pub fn view(&self) -> Option<(GeoCoordinate, u8)> {
        self.view
    }
}

impl MapSurface for HeadlessMap {
    fn set_view(&mut self, center: GeoCoordinate, zoom: u8) {
        self.view = Some((center, zoom));
    }

    fn show_user_marker(&mut self, coordinate: GeoCoordinate, label: &str) {
        self.user_marker = Some((coordinate, label.to_string()));
    }

    fn add_marker(&mut self, descriptor: &MapMarkerDescriptor) -> MarkerHandle {
        self.next_handle += 1;
        let handle = MarkerHandle(self.next_handle);
        self.markers.insert(
            descriptor.correlation_key.clone(),
            HeadlessMarker {
                handle,
                descriptor: descriptor.clone(),
            },
        );
        handle
    }

    fn remove_marker(&mut self, key: &ObjectId) -> bool {
        self.markers.remove(key).is_some()
    }
}
