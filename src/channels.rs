pub const POSITION: &str = "/sensors/position";
pub const ACCELERATION: &str = "/sensors/acceleration";
pub const MAGNETIC_FIELD: &str = "/sensors/magnetic_field";
