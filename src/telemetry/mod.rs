mod service;

pub use service::{validate_channel_name, TelemetryError, TelemetryService};
