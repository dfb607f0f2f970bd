//! Core engine for placing geo-anchored objects and keeping the AR scene and
//! the map in sync.
//! This crate is the single source of truth for placement and ownership rules.

pub mod backend;
pub mod config;
pub mod db;
pub mod geo;
pub mod logging;
pub mod model;
pub mod repo;
pub mod scene;
pub mod service;

pub use backend::{
    AssetUpload, BackendError, BackendResult, LocalBackend, ObjectBackend, UploadedAsset,
};
pub use config::{EngineConfig, FreezePolicy, OffsetMode, PresentationConfig};
pub use geo::bearing::{bearing, pointer_angle, BearingIndicator};
pub use geo::location::{FixOrigin, LocationError, LocationFix, LocationProvider, PositionSource};
pub use logging::{
    default_log_level, init_logging, logging_status, LogTarget, LoggingError, LoggingResult,
};
pub use model::geo::GeoCoordinate;
pub use model::object::{
    DeviceIdentity, ObjectId, ObjectKind, PlacedObject, PlacementRequest, ValidationError,
};
pub use repo::{RepoError, RepoResult};
pub use scene::{ArScene, EntityHandle, HeadlessMap, HeadlessScene, LocalPosition, MapSurface};
pub use service::condition::{DeleteRejection, EngineCondition};
pub use service::ownership::{can_mutate, OwnershipGate};
pub use service::placement::{PlacementStateMachine, SelectableKind};
pub use service::registry::ObjectRegistry;
pub use service::session::{PlacementOutcome, Session};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
