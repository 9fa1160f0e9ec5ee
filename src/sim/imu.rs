use anyhow::Result;
use chrono::TimeDelta;
use nalgebra::Vector3;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256StarStar;

use crate::{
    channels,
    core::time::Clock,
    datatypes::MotionVector,
    nodes::{Node, NodeContext, StepResult},
    utils::Publisher,
};

/// Accelerometer of a device lying flat: gravity along +z, plus white noise
#[derive(Debug)]
pub struct SimulatedImu {
    gravity: MotionVector,
    noise: Normal<f64>,
    decimation: usize,
    rng: Xoshiro256StarStar,

    tx_acc: Publisher<MotionVector>,
}

impl SimulatedImu {
    pub fn new(ctx: NodeContext) -> Result<Self> {
        let params = ctx.parameters().get_map("sim.imu")?;

        let g = params.get_param("gravity_ms2")?.value_float()?;
        let noise = Normal::new(0.0, params.get_param("noise_std")?.value_float()?)?;
        let rate_hz = params.get_param("rate_hz")?.value_float()?;

        let tx_acc = ctx.telemetry().publish(channels::ACCELERATION)?;

        Ok(Self {
            gravity: Vector3::new(0.0, 0.0, g),
            noise,
            decimation: super::decimation(ctx.parameters(), rate_hz)?,
            rng: ctx.get_rng_256(),
            tx_acc,
        })
    }
}

impl Node for SimulatedImu {
    fn step(&mut self, i: usize, _: TimeDelta, _: &dyn Clock) -> Result<StepResult> {
        if i % self.decimation != 0 {
            return Ok(StepResult::Continue);
        }

        let noise = Vector3::from_fn(|_, _| self.noise.sample(&mut self.rng));
        self.tx_acc.send(self.gravity + noise);

        Ok(StepResult::Continue)
    }
}
