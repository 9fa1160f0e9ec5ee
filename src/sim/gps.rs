use std::f64::consts::PI;

use anyhow::{ensure, Result};
use chrono::TimeDelta;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256StarStar;

use crate::{
    channels,
    core::time::{seconds_f64, Clock},
    datatypes::PositionSample,
    nodes::{Node, NodeContext, StepResult},
    utils::Publisher,
};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// GPS receiver walking a circle around a center point. The reported
/// accuracy is noisy, so that some fixes fall above the quality threshold.
#[derive(Debug)]
pub struct SimulatedGps {
    center_deg: (f64, f64),
    altitude_m: f64,
    radius_m: f64,
    period_s: f64,
    decimation: usize,
    accuracy: Normal<f64>,
    rng: Xoshiro256StarStar,

    tx_position: Publisher<PositionSample>,
}

impl SimulatedGps {
    pub fn new(ctx: NodeContext) -> Result<Self> {
        let params = ctx.parameters().get_map("sim.gps")?;

        let center = params.get_param("center_deg")?.value_float_arr()?;
        ensure!(center.len() == 2, "sim.gps.center_deg must be [latitude, longitude]");

        let rate_hz = params.get_param("rate_hz")?.value_float()?;
        let accuracy = Normal::new(
            params.get_param("accuracy_mean_m")?.value_float()?,
            params.get_param("accuracy_std_m")?.value_float()?,
        )?;

        let tx_position = ctx.telemetry().publish(channels::POSITION)?;

        Ok(Self {
            center_deg: (center[0], center[1]),
            altitude_m: params.get_param("altitude_m")?.value_float()?,
            radius_m: params.get_param("radius_m")?.value_float()?,
            period_s: params.get_param("period_s")?.value_float()?,
            decimation: super::decimation(ctx.parameters(), rate_hz)?,
            accuracy,
            rng: ctx.get_rng_256(),
            tx_position,
        })
    }

    /// Position on the circle after `t` seconds, in degrees
    fn position_at(&self, t: f64) -> (f64, f64) {
        let angle = 2.0 * PI * t / self.period_s;
        let north_m = self.radius_m * angle.cos();
        let east_m = self.radius_m * angle.sin();

        let (lat0, lon0) = self.center_deg;
        let lat = lat0 + (north_m / EARTH_RADIUS_M).to_degrees();
        let lon = lon0 + (east_m / (EARTH_RADIUS_M * lat0.to_radians().cos())).to_degrees();

        (lat, lon)
    }
}

impl Node for SimulatedGps {
    fn step(&mut self, i: usize, _: TimeDelta, clock: &dyn Clock) -> Result<StepResult> {
        if i % self.decimation != 0 {
            return Ok(StepResult::Continue);
        }

        let (lat, lon) = self.position_at(seconds_f64(clock.elapsed()));
        let accuracy_m = self.accuracy.sample(&mut self.rng).abs();

        let sample =
            PositionSample::new(lat, lon, accuracy_m, clock.utc()).with_altitude(self.altitude_m);
        self.tx_position.send(sample);

        Ok(StepResult::Continue)
    }
}
