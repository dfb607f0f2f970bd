//! AR/map surface contracts and the dual-view renderer.
//!
//! # Responsibility
//! - Describe the rendering collaborators (`ArScene`, `MapSurface`).
//! - Turn one `PlacedObject` into an AR entity and a map marker that share
//!   the object id as correlation key.
//!
//! # Invariants
//! - Both views of an object are created together and withdrawn together.
//! - A map marker exposes a delete affordance only for objects owned by the
//!   current device.
//! - `withdraw` tolerates either side having been removed already.

use crate::config::PresentationConfig;
use crate::model::geo::GeoCoordinate;
use crate::model::object::{DeviceIdentity, ObjectId, ObjectKind, PlacedObject};
use log::{debug, warn};

/// Scene-assigned handle of one AR entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub u64);

/// Map-assigned handle of one marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

/// Handle of one projection-update subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// Entity position in the scene's local frame (metres, y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl LocalPosition {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Kind-specific look of an AR entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ArVisual {
    Box {
        scale: f64,
        color: String,
    },
    ImagePlane {
        src: String,
        width: f64,
        height: f64,
        billboard: bool,
    },
    VideoPlane {
        src: String,
        width: f64,
        height: f64,
        billboard: bool,
        autoplay: bool,
        looped: bool,
    },
}

/// Everything the AR scene needs to spawn one geo-anchored entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ArEntityDescriptor {
    pub object_id: ObjectId,
    pub kind: ObjectKind,
    /// Handed to the scene's geographic projector.
    pub anchor: GeoCoordinate,
    pub visual: ArVisual,
}

/// Everything the map needs to draw one object marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MapMarkerDescriptor {
    pub correlation_key: ObjectId,
    pub coordinate: GeoCoordinate,
    pub label: String,
    pub deletable: bool,
}

/// The two live views of one placed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPair {
    pub object_id: ObjectId,
    pub ar_entity: EntityHandle,
    pub map_marker: MarkerHandle,
}

/// AR scene collaborator.
///
/// The scene owns a geographic projector that keeps moving each entity as
/// location fixes arrive, until `detach_projection` is called for it.
/// Projection updates are delivered by the host to
/// `Session::on_projection_updated`, and only for entities with a live
/// subscription.
pub trait ArScene {
    fn spawn(&mut self, descriptor: &ArEntityDescriptor) -> EntityHandle;
    /// Returns `false` if the entity was already gone.
    fn remove(&mut self, entity: EntityHandle) -> bool;
    fn is_live(&self, entity: EntityHandle) -> bool;
    /// Whether the projector already positioned `entity` at least once.
    fn has_projected(&self, entity: EntityHandle) -> bool;
    fn subscribe_projection(&mut self, entity: EntityHandle) -> Option<SubscriptionHandle>;
    fn unsubscribe_projection(&mut self, subscription: SubscriptionHandle);
    fn detach_projection(&mut self, entity: EntityHandle);
    fn local_position(&self, entity: EntityHandle) -> Option<LocalPosition>;
    fn set_local_position(&mut self, entity: EntityHandle, position: LocalPosition);
}

/// 2D map collaborator.
pub trait MapSurface {
    fn set_view(&mut self, center: GeoCoordinate, zoom: u8);
    /// Draws the viewer's own position marker.
    fn show_user_marker(&mut self, coordinate: GeoCoordinate, label: &str);
    fn add_marker(&mut self, descriptor: &MapMarkerDescriptor) -> MarkerHandle;
    /// Returns `false` if no marker carried `key`.
    fn remove_marker(&mut self, key: &ObjectId) -> bool;
}

/// What `withdraw` actually removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Withdrawal {
    pub entity_removed: bool,
    pub marker_removed: bool,
}

/// Builds and tears down the AR + map views of placed objects.
#[derive(Debug, Clone)]
pub struct DualViewRenderer {
    presentation: PresentationConfig,
    identity: DeviceIdentity,
}

impl DualViewRenderer {
    pub fn new(presentation: PresentationConfig, identity: DeviceIdentity) -> Self {
        Self {
            presentation,
            identity,
        }
    }

    pub fn ar_descriptor(&self, object: &PlacedObject) -> ArEntityDescriptor {
        let presentation = &self.presentation;
        let src = object.asset.clone().unwrap_or_default();
        let visual = match object.kind {
            ObjectKind::Cube => ArVisual::Box {
                scale: presentation.cube.scale,
                color: presentation.cube.color.clone(),
            },
            ObjectKind::Image => ArVisual::ImagePlane {
                src,
                width: presentation.image.width,
                height: presentation.image.height,
                billboard: presentation.image.billboard,
            },
            ObjectKind::Video => ArVisual::VideoPlane {
                src,
                width: presentation.video.width,
                height: presentation.video.height,
                billboard: presentation.video.billboard,
                autoplay: presentation.video_autoplay,
                looped: presentation.video_loop,
            },
        };

        ArEntityDescriptor {
            object_id: object.id.clone(),
            kind: object.kind,
            anchor: object.coordinate,
            visual,
        }
    }

    pub fn marker_descriptor(&self, object: &PlacedObject) -> MapMarkerDescriptor {
        let deletable = object.is_owned_by(&self.identity);
        let label = match (object.kind, deletable) {
            (ObjectKind::Cube, true) => "Your AR cube",
            (ObjectKind::Cube, false) => "AR cube",
            (ObjectKind::Image, true) => "Your AR image",
            (ObjectKind::Image, false) => "AR image",
            (ObjectKind::Video, true) => "Your AR video",
            (ObjectKind::Video, false) => "AR video",
        };
        MapMarkerDescriptor {
            correlation_key: object.id.clone(),
            coordinate: object.coordinate,
            label: label.to_string(),
            deletable,
        }
    }

    /// Materializes both views of `object`.
    pub fn present(
        &self,
        object: &PlacedObject,
        scene: &mut dyn ArScene,
        map: &mut dyn MapSurface,
    ) -> ViewPair {
        let ar_entity = scene.spawn(&self.ar_descriptor(object));
        let map_marker = map.add_marker(&self.marker_descriptor(object));
        debug!(
            "event=views_present module=scene status=ok object_id={} kind={} entity={} marker={}",
            object.id,
            object.kind.as_str(),
            ar_entity.0,
            map_marker.0
        );
        ViewPair {
            object_id: object.id.clone(),
            ar_entity,
            map_marker,
        }
    }

    /// Spawns a replacement AR entity for an object whose entity left the
    /// scene. The map marker is untouched.
    pub fn respawn_entity(&self, object: &PlacedObject, scene: &mut dyn ArScene) -> EntityHandle {
        let ar_entity = scene.spawn(&self.ar_descriptor(object));
        debug!(
            "event=views_respawn module=scene status=ok object_id={} entity={}",
            object.id, ar_entity.0
        );
        ar_entity
    }

    /// Removes both views; already-missing sides are skipped.
    pub fn withdraw(
        &self,
        pair: &ViewPair,
        scene: &mut dyn ArScene,
        map: &mut dyn MapSurface,
    ) -> Withdrawal {
        let entity_removed = scene.is_live(pair.ar_entity) && scene.remove(pair.ar_entity);
        let marker_removed = map.remove_marker(&pair.object_id);
        if !entity_removed || !marker_removed {
            warn!(
                "event=views_withdraw module=scene status=partial object_id={} entity_removed={entity_removed} marker_removed={marker_removed}",
                pair.object_id
            );
        }
        Withdrawal {
            entity_removed,
            marker_removed,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}
