//! Geographic coordinate value type.
//!
//! # Invariants
//! - Latitude/longitude are degrees with WGS84 semantics.
//! - Latitude must stay within `[-90, 90]`; longitude is accepted unbounded
//!   and normalized into `(-180, 180]` where positions are compared.

use crate::model::object::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Tolerance used when deciding whether two coordinates denote one position.
const SAME_POSITION_EPSILON_DEG: f64 = 1e-12;

/// Immutable latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Rejects non-finite components and out-of-range latitude.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(ValidationError::NonFiniteCoordinate);
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::LatitudeOutOfRange(self.latitude));
        }
        Ok(())
    }

    /// Longitude folded into `(-180, 180]`.
    pub fn normalized_longitude(&self) -> f64 {
        let folded = (self.longitude + 180.0).rem_euclid(360.0) - 180.0;
        if folded == -180.0 {
            180.0
        } else {
            folded
        }
    }

    /// Returns whether both coordinates denote the same point on the sphere.
    ///
    /// Longitudes are compared after normalization, so `(0, 10)` and
    /// `(0, 370)` are the same position. At the poles every longitude is.
    pub fn same_position(&self, other: &GeoCoordinate) -> bool {
        if (self.latitude - other.latitude).abs() > SAME_POSITION_EPSILON_DEG {
            return false;
        }
        if self.latitude.abs() == 90.0 {
            return true;
        }
        let delta = (self.normalized_longitude() - other.normalized_longitude()).abs();
        delta <= SAME_POSITION_EPSILON_DEG || (360.0 - delta) <= SAME_POSITION_EPSILON_DEG
    }
}

impl Display for GeoCoordinate {
    /// Prints at most 5 decimals (~1 m), which is what log lines carry.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}
