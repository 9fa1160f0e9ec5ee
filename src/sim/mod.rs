mod gps;
mod imu;
mod magn;

use anyhow::{bail, Result};

pub use gps::SimulatedGps;
pub use imu::SimulatedImu;
pub use magn::SimulatedMagnetometer;

use crate::{nodes::NodeManager, parameters::ParameterMap};

/// Number of executor steps between two samples of a sensor running at
/// `rate_hz`
pub fn decimation(params: &ParameterMap, rate_hz: f64) -> Result<usize> {
    let dt = params.get_param("sim.dt")?.value_float()?;
    if dt <= 0.0 || rate_hz <= 0.0 {
        bail!("Simulation time step ({dt}) and sensor rate ({rate_hz}) must be positive");
    }

    let period = 1.0 / rate_hz;
    let ratio = period / dt;
    if ratio < 1.0 || (ratio - ratio.round()).abs() > 1e-8 {
        bail!("Simulation time step ({dt}) is not a divisor of sensor period ({period})");
    }

    Ok(ratio.round() as usize)
}

pub fn build_simulation(nm: &mut NodeManager) -> Result<()> {
    nm.add_node("gps", |ctx| Ok(Box::new(SimulatedGps::new(ctx)?)))?;
    nm.add_node("imu", |ctx| Ok(Box::new(SimulatedImu::new(ctx)?)))?;
    nm.add_node("magn", |ctx| Ok(Box::new(SimulatedMagnetometer::new(ctx)?)))?;

    Ok(())
}
