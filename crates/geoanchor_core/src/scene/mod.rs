//! Visual surfaces: the AR scene, the map, and anchor freezing.
//!
//! # Responsibility
//! - Define the contracts of the AR and map collaborators.
//! - Render each placed object into both surfaces, keyed by object id.
//! - Freeze each AR entity's transform exactly once after placement.
//!
//! # Invariants
//! - After freeze no component writes an AR entity's local transform.

pub mod freeze;
pub mod headless;
pub mod views;

pub use freeze::{AnchorBinding, AnchorFreezeController, BindOutcome, FreezeOutcome};
pub use headless::{HeadlessMap, HeadlessScene};
pub use views::{
    ArEntityDescriptor, ArScene, ArVisual, DualViewRenderer, EntityHandle, LocalPosition,
    MapMarkerDescriptor, MapSurface, MarkerHandle, SubscriptionHandle, ViewPair, Withdrawal,
};
