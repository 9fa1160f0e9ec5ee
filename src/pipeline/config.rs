use std::time::Duration;

use thiserror::Error;

use super::{filter::DEFAULT_THRESHOLD_M, throttler::DEFAULT_WINDOW};
use crate::{channels, parameters::{self, ParameterMap}};

pub const DEFAULT_WORKERS: usize = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid parameters: {0}")]
    Parameters(#[from] parameters::Error),

    #[error("Parameter '{path}' out of range: {reason}")]
    OutOfRange { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub position: String,
    pub acceleration: String,
    pub magnetic_field: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            position: channels::POSITION.to_string(),
            acceleration: channels::ACCELERATION.to_string(),
            magnetic_field: channels::MAGNETIC_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Position fixes with an accuracy radius at or above this are dropped
    pub accuracy_threshold_m: f64,

    pub window: Duration,

    pub workers: usize,

    pub channels: ChannelConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            accuracy_threshold_m: DEFAULT_THRESHOLD_M,
            window: DEFAULT_WINDOW,
            workers: DEFAULT_WORKERS,
            channels: ChannelConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads the `pipeline` section of `params`. Missing values keep their
    /// default.
    pub fn from_parameters(params: &ParameterMap) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(p) = params.get_param_opt("pipeline.accuracy_threshold_m")? {
            let threshold = p.value_float()?;
            if threshold.is_nan() || threshold <= 0.0 {
                return Err(out_of_range(p.path(), "must be positive"));
            }
            cfg.accuracy_threshold_m = threshold;
        }

        if let Some(p) = params.get_param_opt("pipeline.window_s")? {
            let window_s = p.value_float()?;
            cfg.window = Duration::try_from_secs_f64(window_s)
                .ok()
                .filter(|w| !w.is_zero())
                .ok_or_else(|| out_of_range(p.path(), "must be a positive number of seconds"))?;
        }

        if let Some(p) = params.get_param_opt("pipeline.workers")? {
            let workers = p.value_int()?;
            cfg.workers = usize::try_from(workers)
                .ok()
                .filter(|w| *w > 0)
                .ok_or_else(|| out_of_range(p.path(), "at least one worker is needed"))?;
        }

        let channels = [
            ("pipeline.channels.position", &mut cfg.channels.position),
            ("pipeline.channels.acceleration", &mut cfg.channels.acceleration),
            ("pipeline.channels.magnetic_field", &mut cfg.channels.magnetic_field),
        ];
        for (path, channel) in channels {
            if let Some(p) = params.get_param_opt(path)? {
                *channel = p.value_string()?;
            }
        }

        Ok(cfg)
    }
}

fn out_of_range(path: &str, reason: &str) -> ConfigError {
    ConfigError::OutOfRange {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
