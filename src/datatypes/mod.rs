pub mod composite;
pub mod sensors;

pub use composite::{CompositeSample, Heading};
pub use sensors::{MotionVector, PositionSample};
