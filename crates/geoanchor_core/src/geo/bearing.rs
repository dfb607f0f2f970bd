//! Compass bearing toward a reference object.
//!
//! Bearings use the spherical initial-bearing formula
//! `θ = atan2(sin Δλ · cos φ2, cos φ1 · sin φ2 − sin φ1 · cos φ2 · cos Δλ)`.
//! It is defined for every pair except coincident points (and exact
//! antipodes), where both atan2 arguments vanish; `bearing` returns `None`
//! there and the indicator keeps its last angle.
//!
//! All functions are pure and cheap enough to call on every heading update.

use crate::model::geo::GeoCoordinate;
use crate::model::object::ObjectId;

/// Below this magnitude both atan2 arguments are treated as zero.
const DEGENERATE_EPSILON: f64 = 1e-15;

/// Folds any angle into `[0, 360)`.
pub fn normalize_degrees(value: f64) -> f64 {
    let folded = value.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if folded >= 360.0 {
        0.0
    } else {
        folded
    }
}

/// Folds any angle into `(-180, 180]`.
pub fn normalize_signed_degrees(value: f64) -> f64 {
    let folded = normalize_degrees(value);
    if folded > 180.0 {
        folded - 360.0
    } else {
        folded
    }
}

/// Initial great-circle bearing from `from` to `to`, in `[0, 360)` degrees
/// clockwise from true north. `None` when the bearing is undefined.
pub fn bearing(from: GeoCoordinate, to: GeoCoordinate) -> Option<f64> {
    if !from.latitude.is_finite()
        || !from.longitude.is_finite()
        || !to.latitude.is_finite()
        || !to.longitude.is_finite()
    {
        return None;
    }
    if from.same_position(&to) {
        return None;
    }

    let phi1 = from.latitude.to_radians();
    let phi2 = to.latitude.to_radians();
    let delta_lambda = (to.normalized_longitude() - from.normalized_longitude()).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    if y.abs() < DEGENERATE_EPSILON && x.abs() < DEGENERATE_EPSILON {
        return None;
    }

    Some(normalize_degrees(y.atan2(x).to_degrees()))
}

/// Rotation for an on-screen arrow: bearing relative to device heading,
/// in `(-180, 180]`.
pub fn pointer_angle(bearing_deg: f64, heading_deg: f64) -> f64 {
    normalize_signed_degrees(bearing_deg - heading_deg)
}

/// Direction indicator state for one viewer and one reference object.
///
/// A missing heading is treated as north-up (heading `0`), so devices
/// without an orientation sensor still get a usable arrow.
#[derive(Debug, Clone, Default)]
pub struct BearingIndicator {
    viewer: Option<GeoCoordinate>,
    target: Option<(ObjectId, GeoCoordinate)>,
    heading: Option<f64>,
    angle: Option<f64>,
}

impl BearingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_viewer(&mut self, viewer: GeoCoordinate) -> Option<f64> {
        self.viewer = Some(viewer);
        self.recompute()
    }

    pub fn set_target(&mut self, id: ObjectId, coordinate: GeoCoordinate) -> Option<f64> {
        self.target = Some((id, coordinate));
        self.angle = None;
        self.recompute()
    }

    /// Clears the reference object; the indicator hides.
    pub fn clear_target(&mut self) {
        self.target = None;
        self.angle = None;
    }

    /// Clears the reference object if it is `id`.
    pub fn forget(&mut self, id: &ObjectId) -> bool {
        let matches = self
            .target
            .as_ref()
            .is_some_and(|(target_id, _)| target_id == id);
        if matches {
            self.clear_target();
        }
        matches
    }

    /// Applies a device heading update and returns the angle to draw.
    ///
    /// Non-finite headings are ignored.
    pub fn on_heading(&mut self, heading_deg: f64) -> Option<f64> {
        if heading_deg.is_finite() {
            self.heading = Some(normalize_degrees(heading_deg));
        }
        self.recompute()
    }

    /// Last computed angle; `None` means the indicator is hidden.
    pub fn angle(&self) -> Option<f64> {
        self.angle
    }

    pub fn target(&self) -> Option<&ObjectId> {
        self.target.as_ref().map(|(id, _)| id)
    }

    fn recompute(&mut self) -> Option<f64> {
        let (Some(viewer), Some((_, target))) = (self.viewer, self.target.as_ref()) else {
            return self.angle;
        };
        // Undefined bearing keeps whatever was last shown.
        if let Some(bearing_deg) = bearing(viewer, *target) {
            self.angle = Some(pointer_angle(bearing_deg, self.heading.unwrap_or(0.0)));
        }
        self.angle
    }
}

#[cfg(test)]
mod tests {
    use super::{bearing, normalize_degrees, pointer_angle, BearingIndicator};
    use crate::model::geo::GeoCoordinate;
    use crate::model::object::ObjectId;

    fn approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn cardinal_directions() {
        let origin = GeoCoordinate::new(0.0, 0.0);
        approx(bearing(origin, GeoCoordinate::new(1.0, 0.0)).expect("north"), 0.0);
        approx(bearing(origin, GeoCoordinate::new(0.0, 1.0)).expect("east"), 90.0);
        approx(bearing(origin, GeoCoordinate::new(-1.0, 0.0)).expect("south"), 180.0);
        approx(bearing(origin, GeoCoordinate::new(0.0, -1.0)).expect("west"), 270.0);
    }

    #[test]
    fn crosses_antimeridian_the_short_way() {
        let from = GeoCoordinate::new(0.0, 179.5);
        let to = GeoCoordinate::new(0.0, -179.5);
        approx(bearing(from, to).expect("defined"), 90.0);
    }

    #[test]
    fn coincident_points_have_no_bearing() {
        let a = GeoCoordinate::new(12.9716, 77.5946);
        assert_eq!(bearing(a, a), None);
        assert_eq!(bearing(a, GeoCoordinate::new(12.9716, 77.5946 - 360.0)), None);
    }

    #[test]
    fn invariant_under_full_turns_of_longitude() {
        let from = GeoCoordinate::new(12.9716, 77.5946);
        let to = GeoCoordinate::new(12.9720, 77.5950);
        let base = bearing(from, to).expect("defined");
        for turns in [-2.0, -1.0, 1.0, 3.0] {
            let shifted_from = GeoCoordinate::new(from.latitude, from.longitude + 360.0 * turns);
            let shifted_to = GeoCoordinate::new(to.latitude, to.longitude + 360.0 * turns);
            approx(bearing(shifted_from, to).expect("defined"), base);
            approx(bearing(from, shifted_to).expect("defined"), base);
            approx(bearing(shifted_from, shifted_to).expect("defined"), base);
        }
    }

    #[test]
    fn pointer_angle_is_signed_and_wrapped() {
        approx(pointer_angle(10.0, 350.0), 20.0);
        approx(pointer_angle(350.0, 10.0), -20.0);
        approx(pointer_angle(180.0, 0.0), 180.0);
        approx(pointer_angle(0.0, 180.0), 180.0);
        approx(normalize_degrees(-90.0), 270.0);
    }

    #[test]
    fn indicator_hidden_until_viewer_and_target_known() {
        let mut indicator = BearingIndicator::new();
        assert_eq!(indicator.on_heading(45.0), None);
        indicator.set_viewer(GeoCoordinate::new(0.0, 0.0));
        assert_eq!(indicator.angle(), None);

        let angle = indicator
            .set_target(ObjectId::new("o1"), GeoCoordinate::new(0.0, 1.0))
            .expect("angle once both ends are known");
        approx(angle, 45.0);
    }

    #[test]
    fn indicator_without_heading_is_north_up() {
        let mut indicator = BearingIndicator::new();
        indicator.set_viewer(GeoCoordinate::new(0.0, 0.0));
        let angle = indicator
            .set_target(ObjectId::new("o1"), GeoCoordinate::new(-1.0, 0.0))
            .expect("defined");
        approx(angle, 180.0);
    }

    #[test]
    fn indicator_holds_last_angle_when_viewer_reaches_target() {
        let mut indicator = BearingIndicator::new();
        indicator.set_viewer(GeoCoordinate::new(0.0, 0.0));
        indicator.set_target(ObjectId::new("o1"), GeoCoordinate::new(0.0, 1.0));
        let before = indicator.angle().expect("defined");

        assert_eq!(indicator.set_viewer(GeoCoordinate::new(0.0, 1.0)), Some(before));
        assert_eq!(indicator.on_heading(90.0), Some(before));
    }

    #[test]
    fn forgetting_target_hides_indicator() {
        let mut indicator = BearingIndicator::new();
        indicator.set_viewer(GeoCoordinate::new(0.0, 0.0));
        indicator.set_target(ObjectId::new("o1"), GeoCoordinate::new(1.0, 0.0));
        assert!(!indicator.forget(&ObjectId::new("other")));
        assert!(indicator.angle().is_some());
        assert!(indicator.forget(&ObjectId::new("o1")));
        assert_eq!(indicator.angle(), None);
        assert_eq!(indicator.target(), None);
    }

    #[test]
    fn ignores_non_finite_heading() {
        let mut indicator = BearingIndicator::new();
        indicator.set_viewer(GeoCoordinate::new(0.0, 0.0));
        indicator.set_target(ObjectId::new("o1"), GeoCoordinate::new(0.0, 1.0));
        indicator.on_heading(30.0);
        let held = indicator.angle();
        assert_eq!(indicator.on_heading(f64::NAN), held);
    }
}
