use nalgebra::Matrix3;

use crate::datatypes::{Heading, MotionVector};

pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Squared acceleration below which the device is considered in free fall
pub const MIN_GRAVITY_SQ: f64 = 0.01 * STANDARD_GRAVITY * STANDARD_GRAVITY;

/// Close to the magnetic poles, or with parallel vectors, the horizontal
/// (east) vector gets too short to give a direction.
pub const MIN_HORIZONTAL_NORM: f64 = 0.1;

/// Device attitude in degrees. Azimuth in [0, 360), pitch in [-90, 90],
/// roll in (-180, 180].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attitude {
    pub azimuth_deg: f64,
    pub pitch_deg: f64,
    pub roll_deg: f64,
}

/// Rotation matrix from the device frame to the world frame (east, north, up),
/// given gravity and the geomagnetic field in device coordinates.
/// Rows are the world axes expressed in the device frame.
pub fn rotation_matrix(
    acceleration: &MotionVector,
    magnetic_field: &MotionVector,
) -> Option<Matrix3<f64>> {
    let g_sq = acceleration.norm_squared();
    if !g_sq.is_finite() || g_sq < MIN_GRAVITY_SQ {
        return None;
    }

    let h = magnetic_field.cross(acceleration);
    let h_norm = h.norm();

    // Non finite input propagates to h
    if !h_norm.is_finite() || h_norm < MIN_HORIZONTAL_NORM {
        return None;
    }

    let east = h / h_norm;
    let up = acceleration.normalize();
    let north = up.cross(&east);

    Some(Matrix3::from_rows(&[
        east.transpose(),
        north.transpose(),
        up.transpose(),
    ]))
}

pub fn attitude(r: &Matrix3<f64>) -> Attitude {
    let azimuth = r[(0, 1)].atan2(r[(1, 1)]);
    let pitch = (-r[(2, 1)]).clamp(-1.0, 1.0).asin();
    let roll = (-r[(2, 0)]).atan2(r[(2, 2)]);

    Attitude {
        azimuth_deg: Heading::from_degrees(azimuth.to_degrees())
            .degrees()
            .unwrap_or(0.0),
        pitch_deg: pitch.to_degrees(),
        roll_deg: roll.to_degrees(),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OrientationEstimator;

impl OrientationEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Heading relative to magnetic north, or [`Heading::Undetermined`] when
    /// the pair of vectors does not define one.
    pub fn estimate(&self, acceleration: &MotionVector, magnetic_field: &MotionVector) -> Heading {
        match rotation_matrix(acceleration, magnetic_field) {
            Some(r) => Heading::from_degrees(r[(0, 1)].atan2(r[(1, 1)]).to_degrees()),
            None => Heading::Undetermined,
        }
    }

    pub fn attitude(
        &self,
        acceleration: &MotionVector,
        magnetic_field: &MotionVector,
    ) -> Option<Attitude> {
        rotation_matrix(acceleration, magnetic_field).map(|r| attitude(&r))
    }
}
