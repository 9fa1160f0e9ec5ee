use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::sensors::PositionSample;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Heading {
    /// Always in [0, 360)
    Degrees(f64),

    /// The estimation failed for the current pair of motion vectors
    Undetermined,
}

impl Heading {
    /// Wraps `angle` into [0, 360). Non finite angles are undetermined.
    pub fn from_degrees(angle: f64) -> Self {
        if !angle.is_finite() {
            return Heading::Undetermined;
        }

        let wrapped = angle.rem_euclid(360.0);

        // rem_euclid of a tiny negative angle rounds up to exactly 360
        if wrapped >= 360.0 {
            Heading::Degrees(0.0)
        } else {
            Heading::Degrees(wrapped)
        }
    }

    pub fn degrees(&self) -> Option<f64> {
        match self {
            Heading::Degrees(d) => Some(*d),
            Heading::Undetermined => None,
        }
    }

    pub fn is_determined(&self) -> bool {
        matches!(self, Heading::Degrees(_))
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Heading::Degrees(d) => write!(f, "{d:.1} deg"),
            Heading::Undetermined => write!(f, "undetermined"),
        }
    }
}

// Serialized as a plain number, or null when undetermined
impl Serialize for Heading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Heading::Degrees(d) => serializer.serialize_some(d),
            Heading::Undetermined => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Heading {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let angle = Option::<f64>::deserialize(deserializer)?;
        Ok(angle.map_or(Heading::Undetermined, Heading::from_degrees))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSample {
    pub position: PositionSample,

    #[serde(rename = "azimuth_deg")]
    pub orientation: Heading,
}

impl CompositeSample {
    pub fn new(position: PositionSample, orientation: Heading) -> Self {
        Self {
            position,
            orientation,
        }
    }
}
