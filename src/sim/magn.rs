use anyhow::Result;
use chrono::TimeDelta;
use nalgebra::Vector3;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256StarStar;

use crate::{
    channels,
    core::time::{seconds_f64, Clock},
    datatypes::MotionVector,
    nodes::{Node, NodeContext, StepResult},
    utils::Publisher,
};

/// Magnetometer of a flat device turning at a constant rate. The earth field
/// (north and down components) is rotated into the device frame.
#[derive(Debug)]
pub struct SimulatedMagnetometer {
    field_north_ut: f64,
    field_down_ut: f64,
    initial_heading_deg: f64,
    turn_rate_dps: f64,
    noise: Normal<f64>,
    decimation: usize,
    rng: Xoshiro256StarStar,

    tx_magn: Publisher<MotionVector>,
}

impl SimulatedMagnetometer {
    pub fn new(ctx: NodeContext) -> Result<Self> {
        let params = ctx.parameters().get_map("sim.magn")?;

        let rate_hz = params.get_param("rate_hz")?.value_float()?;
        let noise = Normal::new(0.0, params.get_param("noise_std")?.value_float()?)?;

        let tx_magn = ctx.telemetry().publish(channels::MAGNETIC_FIELD)?;

        Ok(Self {
            field_north_ut: params.get_param("field_north_ut")?.value_float()?,
            field_down_ut: params.get_param("field_down_ut")?.value_float()?,
            initial_heading_deg: params.get_param("initial_heading_deg")?.value_float()?,
            turn_rate_dps: params.get_param("turn_rate_dps")?.value_float()?,
            noise,
            decimation: super::decimation(ctx.parameters(), rate_hz)?,
            rng: ctx.get_rng_256(),
            tx_magn,
        })
    }

    /// True heading of the device after `t` seconds, in degrees
    pub fn heading_at(&self, t: f64) -> f64 {
        (self.initial_heading_deg + self.turn_rate_dps * t).rem_euclid(360.0)
    }

    fn field_at(&self, heading_deg: f64) -> MotionVector {
        let psi = heading_deg.to_radians();
        Vector3::new(
            -self.field_north_ut * psi.sin(),
            self.field_north_ut * psi.cos(),
            -self.field_down_ut,
        )
    }
}

impl Node for SimulatedMagnetometer {
    fn step(&mut self, i: usize, _: TimeDelta, clock: &dyn Clock) -> Result<StepResult> {
        if i % self.decimation != 0 {
            return Ok(StepResult::Continue);
        }

        let heading = self.heading_at(seconds_f64(clock.elapsed()));
        let noise = Vector3::from_fn(|_, _| self.noise.sample(&mut self.rng));
        self.tx_magn.send(self.field_at(heading) + noise);

        Ok(StepResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use approx::assert_relative_eq;
    use chrono::DateTime;

    use super::*;
    use crate::{
        core::time::SimulatedClock,
        nodes::NodeManager,
        parameters::parse_string,
        pipeline::OrientationEstimator,
        sim::{tests::TEST_PARAMS, SimulatedImu},
        stream::{Recorder, Source},
        telemetry::TelemetryService,
    };

    #[test]
    fn test_heading_matches_estimator() -> Result<()> {
        let ts = TelemetryService::default();
        let acc = Recorder::new();
        let mag = Recorder::new();
        let _s1 = ts
            .subscribe::<MotionVector>(channels::ACCELERATION)?
            .subscribe(acc.observer());
        let _s2 = ts
            .subscribe::<MotionVector>(channels::MAGNETIC_FIELD)?
            .subscribe(mag.observer());

        let mut nm = NodeManager::new_from_seed(ts.clone(), parse_string(TEST_PARAMS)?, 7);
        nm.add_node("imu", |ctx| Ok(Box::new(SimulatedImu::new(ctx)?)))?;
        nm.add_node("magn", |ctx| Ok(Box::new(SimulatedMagnetometer::new(ctx)?)))?;

        let dt = TimeDelta::milliseconds(100);
        let mut clock = SimulatedClock::new(DateTime::UNIX_EPOCH, TimeDelta::zero());
        for i in 0..20 {
            for (_, node) in nm.nodes_mut() {
                node.step(i, dt, &clock)?;
            }
            clock.step(dt);
        }

        let acc = acc.values();
        let mag = mag.values();
        assert_eq!(acc.len(), 20);
        assert_eq!(mag.len(), 20);

        // Noise free magnetometer, 6 deg/s from 30 deg
        let est = OrientationEstimator::new();
        for (i, (a, m)) in acc.iter().zip(mag.iter()).enumerate() {
            let expected = 30.0 + 0.6 * i as f64;
            let heading = est.estimate(a, m).degrees().unwrap();
            assert_relative_eq!(heading, expected, epsilon = 3.0);
        }

        Ok(())
    }
}
