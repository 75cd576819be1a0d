use nalgebra::Vector3;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The inertial sensors whose samples are correlated with a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "snake_case"))]
pub enum SensorKind {
    /// The gravity vector as reported by the platform's fused gravity sensor.
    Gravity,
    /// The raw accelerometer (gravity included).
    Acceleration,
}

impl SensorKind {
    pub const ALL: [SensorKind; 2] = [SensorKind::Gravity, SensorKind::Acceleration];

    /// A lowercase name used in log output.
    pub fn name(self) -> &'static str {
        match self {
            SensorKind::Gravity => "gravity",
            SensorKind::Acceleration => "acceleration",
        }
    }
}

/// A single inertial reading.
///
/// `source_timestamp` is taken from the device pose clock, the same clock that stamps captured
/// images, so it is the one used for correlation. `wall_timestamp` is the monotonic clock of the
/// sensor event, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub source_timestamp: f64,
    pub wall_timestamp: f64,
}

impl Sample {
    pub fn new(vector: Vector3<f64>, source_timestamp: f64, wall_timestamp: f64) -> Self {
        Self {
            x: vector.x,
            y: vector.y,
            z: vector.z,
            source_timestamp,
            wall_timestamp,
        }
    }

    /// The `[x, y, z]` reading as a vector.
    pub fn vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}
