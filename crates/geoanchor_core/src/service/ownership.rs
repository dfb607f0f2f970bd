//! Client-side ownership gate for object mutation.
//!
//! Every delete entry point (AR tap, map marker button) asks this gate before
//! any remote call. The backend enforces ownership again on its own.

use crate::model::object::{DeviceIdentity, PlacedObject};

/// Returns whether `identity` may mutate `object`.
pub fn can_mutate(object: &PlacedObject, identity: &DeviceIdentity) -> bool {
    object.owner == *identity
}

/// `can_mutate` bound to the current device.
#[derive(Debug, Clone)]
pub struct OwnershipGate {
    identity: DeviceIdentity,
}

impl OwnershipGate {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self { identity }
    }

    pub fn can_mutate(&self, object: &PlacedObject) -> bool {
        can_mutate(object, &self.identity)
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}

#[cfg(test)]
mod tests {
    use super::{can_mutate, OwnershipGate};
    use crate::model::geo::GeoCoordinate;
    use crate::model::object::{DeviceIdentity, ObjectId, ObjectKind, PlacedObject};

    fn owned_by(owner: &DeviceIdentity) -> PlacedObject {
        PlacedObject {
            id: ObjectId::new("o1"),
            coordinate: GeoCoordinate::new(0.0, 0.0),
            kind: ObjectKind::Cube,
            asset: None,
            owner: owner.clone(),
            created_at: 0,
        }
    }

    #[test]
    fn holds_iff_owner_matches_for_random_identities() {
        for _ in 0..256 {
            let owner = DeviceIdentity::generate();
            let other = DeviceIdentity::generate();
            let object = owned_by(&owner);
            assert!(can_mutate(&object, &owner));
            assert_eq!(can_mutate(&object, &other), owner == other);
        }
    }

    #[test]
    fn comparison_is_exact() {
        let owner = DeviceIdentity::parse("device-a").expect("valid identity");
        let object = owned_by(&owner);
        let gate = OwnershipGate::new(DeviceIdentity::parse("DEVICE-A").expect("valid identity"));
        assert!(!gate.can_mutate(&object));
        assert!(OwnershipGate::new(owner).can_mutate(&object));
    }
}
