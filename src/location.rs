//! 3D grain locations.

use strum::{Display, EnumCount, EnumString, VariantNames};

// -------------------------------------------------------------------------------------------------

/// How grain models specify grain locations.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumCount, VariantNames,
)]
pub enum SpatialMode {
    /// Azimuth, elevation (in degrees) and distance.
    #[default]
    Polar,
    /// X (right), Y (front) and Z (up) coordinates.
    Cartesian,
}

// -------------------------------------------------------------------------------------------------

/// Location of a grain relative to the listener, in both polar and cartesian coordinates.
///
/// Azimuth is measured in degrees clockwise from the front (positive = right), elevation in
/// degrees upwards from the horizontal plane. Distances use abstract units, where 1.0 is the
/// reference distance without attenuation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    azimuth: f32,
    elevation: f32,
    distance: f32,
    x: f32,
    y: f32,
    z: f32,
}

impl Default for Location {
    fn default() -> Self {
        Self::from_polar(0.0, 0.0, 1.0)
    }
}

impl Location {
    pub fn from_polar(azimuth: f32, elevation: f32, distance: f32) -> Self {
        let mut location = Self {
            azimuth: 0.0,
            elevation: 0.0,
            distance: 0.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };
        location.set_polar(azimuth, elevation, distance);
        location
    }

    pub fn from_cartesian(x: f32, y: f32, z: f32) -> Self {
        let mut location = Self::default();
        location.set_cartesian(x, y, z);
        location
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }
    pub fn elevation(&self) -> f32 {
        self.elevation
    }
    pub fn distance(&self) -> f32 {
        self.distance
    }
    pub fn x(&self) -> f32 {
        self.x
    }
    pub fn y(&self) -> f32 {
        self.y
    }
    pub fn z(&self) -> f32 {
        self.z
    }

    /// Set polar coordinates and update the cartesian ones. Negative distances are mirrored.
    pub fn set_polar(&mut self, azimuth: f32, elevation: f32, distance: f32) {
        let distance = Self::finite_or(distance, 1.0);
        self.azimuth = Self::finite_or(azimuth, 0.0);
        self.elevation = Self::finite_or(elevation, 0.0);
        self.distance = distance.abs();
        let (az, el) = (self.azimuth.to_radians(), self.elevation.to_radians());
        self.x = distance * el.cos() * az.sin();
        self.y = distance * el.cos() * az.cos();
        self.z = distance * el.sin();
    }

    /// Set cartesian coordinates and update the polar ones.
    pub fn set_cartesian(&mut self, x: f32, y: f32, z: f32) {
        self.x = Self::finite_or(x, 0.0);
        self.y = Self::finite_or(y, 0.0);
        self.z = Self::finite_or(z, 0.0);
        self.distance = (self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        let horizontal = (self.x * self.x + self.y * self.y).sqrt();
        self.azimuth = self.x.atan2(self.y).to_degrees();
        self.elevation = self.z.atan2(horizontal).to_degrees();
    }

    fn finite_or(value: f32, default: f32) -> f32 {
        if value.is_finite() {
            value
        } else {
            default
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "{a} != {b}");
    }

    #[test]
    fn polar_to_cartesian() {
        let front = Location::from_polar(0.0, 0.0, 2.0);
        assert_close(front.x(), 0.0);
        assert_close(front.y(), 2.0);
        assert_close(front.z(), 0.0);

        let right = Location::from_polar(90.0, 0.0, 1.0);
        assert_close(right.x(), 1.0);
        assert_close(right.y(), 0.0);

        let up = Location::from_polar(0.0, 90.0, 1.0);
        assert_close(up.z(), 1.0);
    }

    #[test]
    fn cartesian_to_polar() {
        let left = Location::from_cartesian(-3.0, 0.0, 0.0);
        assert_close(left.azimuth(), -90.0);
        assert_close(left.distance(), 3.0);

        let location = Location::from_cartesian(1.0, 1.0, 0.0);
        assert_close(location.azimuth(), 45.0);
        assert_close(location.distance(), 2.0f32.sqrt());

        let round_trip = Location::from_polar(location.azimuth(), location.elevation(), 1.0);
        assert_close(round_trip.x(), 1.0 / 2.0f32.sqrt());

        let invalid = Location::from_cartesian(f32::NAN, 0.0, 0.0);
        assert_eq!(invalid.distance(), 0.0);
    }
}
