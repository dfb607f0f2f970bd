//! Placed object records and identities.
//!
//! # Responsibility
//! - Define the canonical record returned by the persistence backend.
//! - Define the request shape sent to it when placing an object.
//! - Provide the device identity token used for ownership decisions.
//!
//! # Invariants
//! - `ObjectId` is opaque and assigned by the backend, never by the client.
//! - `asset` is `Some` iff `kind != ObjectKind::Cube`.
//! - `DeviceIdentity` is generated once per installation and then reused.

use crate::model::geo::GeoCoordinate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Server-assigned opaque object identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Opaque token identifying this installation to the backend.
///
/// Not a credential: the backend enforces ownership on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// Generates a fresh random identity.
    ///
    /// Callers should persist it through `DeviceIdentityStore` instead of
    /// calling this directly; regenerating breaks ownership of past objects.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing token, rejecting blank values.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyOwner);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix safe for log lines.
    pub fn redacted(&self) -> String {
        let prefix = self.0.chars().take(8).collect::<String>();
        format!("{prefix}…")
    }
}

impl Display for DeviceIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of placeable object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Solid geometric primitive; carries no asset.
    Cube,
    /// Flat image plane backed by an uploaded asset.
    Image,
    /// Video plane backed by an uploaded asset.
    Video,
}

impl ObjectKind {
    /// Stable storage/wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cube => "cube",
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cube" => Some(Self::Cube),
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn requires_asset(self) -> bool {
        match self {
            Self::Cube => false,
            Self::Image | Self::Video => true,
        }
    }
}

/// Validation failures for model values.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    NonFiniteCoordinate,
    LatitudeOutOfRange(f64),
    MissingAsset(ObjectKind),
    UnexpectedAsset(ObjectKind),
    EmptyOwner,
    EmptyObjectId,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFiniteCoordinate => write!(f, "coordinate must be finite"),
            Self::LatitudeOutOfRange(value) => {
                write!(f, "latitude {value} is outside [-90, 90]")
            }
            Self::MissingAsset(kind) => {
                write!(f, "{} objects require an asset", kind.as_str())
            }
            Self::UnexpectedAsset(kind) => {
                write!(f, "{} objects must not carry an asset", kind.as_str())
            }
            Self::EmptyOwner => write!(f, "owner must not be empty"),
            Self::EmptyObjectId => write!(f, "object id must not be empty"),
        }
    }
}

impl Error for ValidationError {}

fn validate_asset(kind: ObjectKind, asset: Option<&str>) -> Result<(), ValidationError> {
    let has_asset = asset.is_some_and(|value| !value.trim().is_empty());
    match (kind.requires_asset(), has_asset) {
        (true, false) => Err(ValidationError::MissingAsset(kind)),
        (false, true) => Err(ValidationError::UnexpectedAsset(kind)),
        _ => Ok(()),
    }
}

/// Canonical record of one object placed by some device.
///
/// Serialized with flattened `latitude`/`longitude` and `type` naming so the
/// JSON shape matches the backend's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedObject {
    pub id: ObjectId,
    #[serde(flatten)]
    pub coordinate: GeoCoordinate,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    #[serde(default)]
    pub asset: Option<String>,
    pub owner: DeviceIdentity,
    /// Unix epoch seconds assigned by the backend.
    pub created_at: i64,
}

impl PlacedObject {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyObjectId);
        }
        if self.owner.as_str().trim().is_empty() {
            return Err(ValidationError::EmptyOwner);
        }
        self.coordinate.validate()?;
        validate_asset(self.kind, self.asset.as_deref())
    }

    pub fn is_owned_by(&self, identity: &DeviceIdentity) -> bool {
        &self.owner == identity
    }
}

/// Body of a placement request sent to the persistence backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRequest {
    #[serde(flatten)]
    pub coordinate: GeoCoordinate,
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub asset: Option<String>,
    pub owner: DeviceIdentity,
}

impl PlacementRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.coordinate.validate()?;
        validate_asset(self.kind, self.asset.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceIdentity, ObjectId, ObjectKind, PlacedObject, ValidationError};
    use crate::model::geo::GeoCoordinate;

    fn object(kind: ObjectKind, asset: Option<&str>) -> PlacedObject {
        PlacedObject {
            id: ObjectId::new("obj-1"),
            coordinate: GeoCoordinate::new(12.9716, 77.5946),
            kind,
            asset: asset.map(str::to_string),
            owner: DeviceIdentity::parse("device-a").expect("valid identity"),
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn asset_presence_must_match_kind() {
        assert!(object(ObjectKind::Cube, None).validate().is_ok());
        assert!(object(ObjectKind::Video, Some("/uploads/a.mp4"))
            .validate()
            .is_ok());
        assert_eq!(
            object(ObjectKind::Image, None).validate(),
            Err(ValidationError::MissingAsset(ObjectKind::Image))
        );
        assert_eq!(
            object(ObjectKind::Cube, Some("/uploads/a.png")).validate(),
            Err(ValidationError::UnexpectedAsset(ObjectKind::Cube))
        );
    }

    #[test]
    fn blank_asset_counts_as_missing() {
        assert_eq!(
            object(ObjectKind::Image, Some("  ")).validate(),
            Err(ValidationError::MissingAsset(ObjectKind::Image))
        );
    }

    #[test]
    fn kind_strings_are_stable() {
        for kind in [ObjectKind::Cube, ObjectKind::Image, ObjectKind::Video] {
            assert_eq!(ObjectKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ObjectKind::parse("sphere"), None);
    }

    #[test]
    fn identity_parse_trims_and_rejects_blank() {
        assert_eq!(
            DeviceIdentity::parse("  abc ").expect("trimmed").as_str(),
            "abc"
        );
        assert_eq!(
            DeviceIdentity::parse("   "),
            Err(ValidationError::EmptyOwner)
        );
    }

    #[test]
    fn generated_identities_are_distinct() {
        assert_ne!(DeviceIdentity::generate(), DeviceIdentity::generate());
    }

    #[test]
    fn redacted_identity_keeps_only_prefix() {
        let identity = DeviceIdentity::parse("0123456789abcdef").expect("valid identity");
        assert_eq!(identity.redacted(), "01234567…");
    }
}
