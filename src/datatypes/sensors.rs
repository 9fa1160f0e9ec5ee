use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: Option<f64>,

    /// Radius of the error circle
    pub accuracy_m: f64,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(
        latitude_deg: f64,
        longitude_deg: f64,
        accuracy_m: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
            altitude_m: None,
            accuracy_m,
            timestamp,
        }
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }
}

/// Raw 3-axis reading in the device frame (x right, y forward, z up).
/// Acceleration in m/s^2, magnetic field in uT.
pub type MotionVector = Vector3<f64>;
