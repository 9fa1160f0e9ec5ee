use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::TimeDelta;
use rand_xoshiro::{
    rand_core::{RngCore, SeedableRng},
    SplitMix64,
};

use crate::{core::time::Clock, parameters::ParameterMap, telemetry::TelemetryService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    Continue,
    Stop,
}

/// A simulated sensor provider, stepped at a fixed rate by an executor
pub trait Node {
    fn step(&mut self, i: usize, dt: TimeDelta, clock: &dyn Clock) -> Result<StepResult>;
}

pub type BoxNode = Box<dyn Node + Send>;

pub struct NodeManager {
    telemetry: TelemetryService,
    parameters: Arc<ParameterMap>,
    nodes: Vec<(String, BoxNode)>,
    rng: Arc<Mutex<SplitMix64>>,
}

impl NodeManager {
    pub fn new(telemetry: TelemetryService, parameters: ParameterMap) -> Self {
        Self::new_from_seed(telemetry, parameters, rand::random())
    }

    pub fn new_from_seed(telemetry: TelemetryService, parameters: ParameterMap, seed: u64) -> Self {
        NodeManager {
            telemetry,
            parameters: Arc::new(parameters),
            nodes: vec![],
            rng: Arc::new(Mutex::new(SplitMix64::seed_from_u64(seed))),
        }
    }

    pub fn add_node<F>(&mut self, name: &str, creator: F) -> Result<()>
    where
        F: FnOnce(NodeContext) -> Result<BoxNode>,
    {
        let context = NodeContext {
            telemetry: self.telemetry.clone(),
            parameters: self.parameters.clone(),
            rng: self.rng.clone(),
        };

        let node = creator(context).with_context(|| format!("Error creating node '{name}'"))?;
        self.nodes.push((name.to_string(), node));

        Ok(())
    }

    pub fn nodes(&self) -> &[(String, BoxNode)] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [(String, BoxNode)] {
        &mut self.nodes
    }

    pub fn parameters(&self) -> Arc<ParameterMap> {
        self.parameters.clone()
    }

    pub fn telemetry(&self) -> &TelemetryService {
        &self.telemetry
    }
}

#[derive(Debug)]
pub struct NodeContext {
    telemetry: TelemetryService,
    parameters: Arc<ParameterMap>,
    rng: Arc<Mutex<SplitMix64>>,
}

impl NodeContext {
    pub fn telemetry(&self) -> &TelemetryService {
        &self.telemetry
    }

    pub fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    /// A new generator, seeded from the manager's master seed: runs with the
    /// same seed and the same nodes are reproducible
    pub fn get_rng_256<R>(&self) -> R
    where
        R: SeedableRng<Seed = [u8; 32]>,
    {
        let mut seed: [u8; 32] = [0; 32];

        self.rng.lock().unwrap().fill_bytes(&mut seed);

        R::from_seed(seed)
    }
}
