//! One-shot location resolution with fallback.
//!
//! # Invariants
//! - `resolve` always yields a coordinate; GPS failure is reported but never
//!   fatal.
//! - A fix with invalid coordinates is treated like a failed fix.

use crate::config::EngineConfig;
use crate::model::geo::GeoCoordinate;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Why the device could not produce a fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    PermissionDenied,
    Timeout,
    Unavailable(String),
    InvalidFix(String),
}

impl Display for LocationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "location permission denied"),
            Self::Timeout => write!(f, "location fix timed out"),
            Self::Unavailable(reason) => write!(f, "location unavailable: {reason}"),
            Self::InvalidFix(reason) => write!(f, "location fix rejected: {reason}"),
        }
    }
}

impl Error for LocationError {}

/// Device position collaborator.
///
/// Implementations must give up after `timeout` and report `Timeout`.
pub trait PositionSource {
    fn current_fix(&mut self, timeout: Duration) -> Result<GeoCoordinate, LocationError>;
}

/// Where a resolved coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOrigin {
    Gps,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub coordinate: GeoCoordinate,
    pub origin: FixOrigin,
}

/// Outcome of one resolution: the coordinate to use plus the failure, if
/// the fallback had to be used.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub fix: LocationFix,
    pub failure: Option<LocationError>,
}

/// Wraps the device position source and remembers the last fix.
#[derive(Debug, Clone)]
pub struct LocationProvider {
    fallback: GeoCoordinate,
    timeout: Duration,
    current: Option<LocationFix>,
}

impl LocationProvider {
    pub fn new(fallback: GeoCoordinate, timeout: Duration) -> Self {
        Self {
            fallback,
            timeout,
            current: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.fallback_location,
            Duration::from_millis(config.geolocation_timeout_ms),
        )
    }

    /// Asks `source` for a fix, falling back on failure.
    pub fn resolve(&mut self, source: &mut dyn PositionSource) -> Resolution {
        let result = source.current_fix(self.timeout);
        self.accept(result)
    }

    /// Records the outcome of a fix attempt delivered by the host.
    pub fn accept(&mut self, result: Result<GeoCoordinate, LocationError>) -> Resolution {
        let result = result.and_then(|coordinate| {
            coordinate
                .validate()
                .map(|()| coordinate)
                .map_err(|err| LocationError::InvalidFix(err.to_string()))
        });

        let resolution = match result {
            Ok(coordinate) => {
                info!("event=location_fix module=geo status=ok origin=gps coordinate={coordinate}");
                Resolution {
                    fix: LocationFix {
                        coordinate,
                        origin: FixOrigin::Gps,
                    },
                    failure: None,
                }
            }
            Err(err) => {
                // A stale GPS fix beats the fixed fallback.
                let fix = match self.current {
                    Some(previous) if previous.origin == FixOrigin::Gps => previous,
                    _ => LocationFix {
                        coordinate: self.fallback,
                        origin: FixOrigin::Fallback,
                    },
                };
                warn!(
                    "event=location_fix module=geo status=fallback origin={:?} error={err}",
                    fix.origin
                );
                Resolution {
                    fix,
                    failure: Some(err),
                }
            }
        };

        self.current = Some(resolution.fix);
        resolution
    }

    pub fn current(&self) -> Option<LocationFix> {
        self.current
    }

    pub fn fallback(&self) -> GeoCoordinate {
        self.fallback
    }
}

#[cfg(test)]
mod tests {
    use super::{FixOrigin, LocationError, LocationProvider, PositionSource};
    use crate::model::geo::GeoCoordinate;
    use std::time::Duration;

    struct ScriptedSource {
        results: Vec<Result<GeoCoordinate, LocationError>>,
        seen_timeout: Option<Duration>,
    }

    impl PositionSource for ScriptedSource {
        fn current_fix(&mut self, timeout: Duration) -> Result<GeoCoordinate, LocationError> {
            self.seen_timeout = Some(timeout);
            self.results.remove(0)
        }
    }

    fn provider() -> LocationProvider {
        LocationProvider::new(GeoCoordinate::new(12.9716, 77.5946), Duration::from_secs(10))
    }

    #[test]
    fn gps_fix_is_used_when_available() {
        let mut source = ScriptedSource {
            results: vec![Ok(GeoCoordinate::new(48.0, 11.0))],
            seen_timeout: None,
        };
        let mut provider = provider();
        let resolution = provider.resolve(&mut source);
        assert_eq!(resolution.fix.origin, FixOrigin::Gps);
        assert_eq!(resolution.fix.coordinate, GeoCoordinate::new(48.0, 11.0));
        assert!(resolution.failure.is_none());
        assert_eq!(source.seen_timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn failure_falls_back_without_panicking() {
        let mut source = ScriptedSource {
            results: vec![Err(LocationError::PermissionDenied)],
            seen_timeout: None,
        };
        let mut provider = provider();
        let resolution = provider.resolve(&mut source);
        assert_eq!(resolution.fix.origin, FixOrigin::Fallback);
        assert_eq!(
            resolution.fix.coordinate,
            GeoCoordinate::new(12.9716, 77.5946)
        );
        assert_eq!(resolution.failure, Some(LocationError::PermissionDenied));
        assert_eq!(provider.current(), Some(resolution.fix));
    }

    #[test]
    fn invalid_fix_is_treated_as_failure() {
        let mut provider = provider();
        let resolution = provider.accept(Ok(GeoCoordinate::new(f64::NAN, 0.0)));
        assert_eq!(resolution.fix.origin, FixOrigin::Fallback);
        assert!(matches!(
            resolution.failure,
            Some(LocationError::InvalidFix(_))
        ));
    }

    #[test]
    fn later_failure_keeps_previous_gps_fix() {
        let mut provider = provider();
        provider.accept(Ok(GeoCoordinate::new(48.0, 11.0)));
        let resolution = provider.accept(Err(LocationError::Timeout));
        assert_eq!(resolution.fix.origin, FixOrigin::Gps);
        assert_eq!(resolution.fix.coordinate, GeoCoordinate::new(48.0, 11.0));
    }
}
