//! Engine configuration.
//!
//! # Responsibility
//! - Hold the tunables of a session: fallback location, geolocation timeout,
//!   map zoom, freeze offsets and AR presentation parameters.
//! - Parse overrides from JSON; any field left out keeps its default.
//!
//! # Invariants
//! - A config returned by `from_json_str` has passed `validate()`.
//! - Vertical offsets and visual parameters are presentation choices; none of
//!   them affect what is persisted.

use crate::model::geo::GeoCoordinate;
use crate::model::object::ObjectKind;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fallback used when the device cannot produce a GPS fix.
pub const DEFAULT_FALLBACK_LOCATION: GeoCoordinate = GeoCoordinate::new(12.9716, 77.5946);
pub const DEFAULT_GEOLOCATION_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAP_ZOOM: u8 = 18;
const MAX_MAP_ZOOM: u8 = 22;

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "config parse failed: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// How the per-kind vertical offset combines with the captured position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetMode {
    /// `y` is overwritten with the offset; captured `x`/`z` are kept.
    Replace,
    /// `y` becomes captured `y` plus the offset.
    Additive,
}

/// Vertical offset in scene units, one constant per kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KindOffsets {
    pub cube: f64,
    pub image: f64,
    pub video: f64,
}

impl KindOffsets {
    pub fn for_kind(&self, kind: ObjectKind) -> f64 {
        match kind {
            ObjectKind::Cube => self.cube,
            ObjectKind::Image => self.image,
            ObjectKind::Video => self.video,
        }
    }
}

impl Default for KindOffsets {
    fn default() -> Self {
        Self {
            cube: -0.7,
            image: 0.2,
            video: 0.4,
        }
    }
}

/// Anchor freeze tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreezePolicy {
    pub offsets: KindOffsets,
    pub offset_mode: OffsetMode,
    /// How long an unfrozen binding may wait for its first projection update
    /// before it is resubscribed.
    pub projection_timeout_ms: i64,
    /// Resubscribe attempts before a binding is reported as lost.
    pub max_resubscribe_attempts: u32,
}

impl Default for FreezePolicy {
    fn default() -> Self {
        Self {
            offsets: KindOffsets::default(),
            offset_mode: OffsetMode::Replace,
            projection_timeout_ms: 5_000,
            max_resubscribe_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CubeStyle {
    /// Uniform scale; small enough to sit on a phone screen at a few metres.
    pub scale: f64,
    pub color: String,
}

impl Default for CubeStyle {
    fn default() -> Self {
        Self {
            scale: 0.4,
            color: "red".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneStyle {
    pub width: f64,
    pub height: f64,
    /// Whether the plane turns to face the camera.
    pub billboard: bool,
}

impl Default for PlaneStyle {
    fn default() -> Self {
        Self {
            width: 1.6,
            height: 0.9,
            billboard: true,
        }
    }
}

/// Kind-specific AR visual parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    pub cube: CubeStyle,
    pub image: PlaneStyle,
    pub video: PlaneStyle,
    pub video_autoplay: bool,
    pub video_loop: bool,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            cube: CubeStyle::default(),
            image: PlaneStyle {
                width: 1.0,
                height: 1.0,
                billboard: true,
            },
            video: PlaneStyle::default(),
            video_autoplay: true,
            video_loop: true,
        }
    }
}

/// Session-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fallback_location: GeoCoordinate,
    pub geolocation_timeout_ms: u64,
    pub map_zoom: u8,
    pub freeze: FreezePolicy,
    pub presentation: PresentationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_location: DEFAULT_FALLBACK_LOCATION,
            geolocation_timeout_ms: DEFAULT_GEOLOCATION_TIMEOUT_MS,
            map_zoom: DEFAULT_MAP_ZOOM,
            freeze: FreezePolicy::default(),
            presentation: PresentationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a JSON document and validates the result.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fallback_location
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("fallback_location: {err}")))?;
        if self.geolocation_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "geolocation_timeout_ms must be positive".to_string(),
            ));
        }
        if self.map_zoom > MAX_MAP_ZOOM {
            return Err(ConfigError::Invalid(format!(
                "map_zoom {} exceeds {MAX_MAP_ZOOM}",
                self.map_zoom
            )));
        }
        if self.freeze.projection_timeout_ms <= 0 {
            return Err(ConfigError::Invalid(
                "freeze.projection_timeout_ms must be positive".to_string(),
            ));
        }

        let offsets = self.freeze.offsets;
        for (name, value) in [
            ("cube", offsets.cube),
            ("image", offsets.image),
            ("video", offsets.video),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "freeze.offsets.{name} must be finite"
                )));
            }
        }

        let presentation = &self.presentation;
        require_positive("presentation.cube.scale", presentation.cube.scale)?;
        require_positive("presentation.image.width", presentation.image.width)?;
        require_positive("presentation.image.height", presentation.image.height)?;
        require_positive("presentation.video.width", presentation.video.width)?;
        require_positive("presentation.video.height", presentation.video.height)?;
        if presentation.cube.color.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "presentation.cube.color must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{name} must be a positive number")))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig, OffsetMode, DEFAULT_FALLBACK_LOCATION};
    use crate::model::object::ObjectKind;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.fallback_location, DEFAULT_FALLBACK_LOCATION);
        assert_eq!(config.map_zoom, 18);
        assert_eq!(config.freeze.offset_mode, OffsetMode::Replace);
    }

    #[test]
    fn per_kind_offsets_are_distinct() {
        let offsets = EngineConfig::default().freeze.offsets;
        let cube = offsets.for_kind(ObjectKind::Cube);
        let image = offsets.for_kind(ObjectKind::Image);
        let video = offsets.for_kind(ObjectKind::Video);
        assert_ne!(cube, image);
        assert_ne!(image, video);
        assert_ne!(cube, video);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{"map_zoom": 16, "freeze": {"offset_mode": "additive", "offsets": {"cube": -1.0}}}"#,
        )
        .expect("partial config should parse");
        assert_eq!(config.map_zoom, 16);
        assert_eq!(config.freeze.offset_mode, OffsetMode::Additive);
        assert_eq!(config.freeze.offsets.cube, -1.0);
        assert_eq!(config.freeze.offsets.video, 0.4);
        assert_eq!(config.geolocation_timeout_ms, 10_000);
    }

    #[test]
    fn rejects_invalid_values() {
        let raw = r#"{"fallback_location": {"latitude": 120.0, "longitude": 0.0}}"#;
        let err = EngineConfig::from_json_str(raw).expect_err("latitude out of range must fail");
        assert!(
            matches!(err, ConfigError::Invalid(message) if message.contains("fallback_location"))
        );

        let err = EngineConfig::from_json_str(r#"{"presentation": {"cube": {"scale": 0.0}}}"#)
            .expect_err("zero scale must fail");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_json_str("{not json").expect_err("garbage must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
