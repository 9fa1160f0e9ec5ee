use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Instant,
};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use log::info;

use super::{NodeManager, StepResult};
use crate::core::time::SimulatedClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One step every `dt` of wall clock time
    RealTime,
    AsFastAsPossible,
}

pub struct PacedExecutor {
    pub dt: TimeDelta,
    pub pacing: Pacing,
    pub max_steps: Option<usize>,
    pub epoch: DateTime<Utc>,
}

impl PacedExecutor {
    pub fn new(dt: TimeDelta, pacing: Pacing) -> Self {
        Self {
            dt,
            pacing,
            max_steps: None,
            epoch: Utc::now(),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Runs until a node stops, `max_steps` is reached or `stop` is set.
    /// Returns the number of completed steps. Nodes (and the publishers they
    /// own) are dropped on return.
    pub fn run_blocking(&self, mut nm: NodeManager, stop: &AtomicBool) -> Result<usize> {
        let dt_std = self
            .dt
            .to_std()
            .context("Executor time step must be positive")?;

        let mut clock = SimulatedClock::new(self.epoch, TimeDelta::zero());
        let start = Instant::now();

        let mut i = 0usize;
        'outer: while self.max_steps.is_none_or(|max| i < max) {
            if stop.load(Ordering::Relaxed) {
                info!("Stop requested after {i} steps");
                break;
            }

            for (name, node) in nm.nodes_mut() {
                let res = node
                    .step(i, self.dt, &clock)
                    .with_context(|| format!("Node '{name}' failed at step {i}"))?;

                if res == StepResult::Stop {
                    info!("Node '{name}' requested stop at step {i}");
                    i += 1;
                    break 'outer;
                }
            }

            i += 1;
            clock.step(self.dt);

            if self.pacing == Pacing::RealTime {
                let target = start + dt_std * i as u32;
                let now = Instant::now();
                if target > now {
                    thread::sleep(target - now);
                }
            }
        }

        Ok(i)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::bail;

    use super::*;
    use crate::{
        core::time::Clock,
        nodes::{Node, NodeContext},
        parameters::ParameterMap,
        telemetry::TelemetryService,
    };

    struct Counter {
        stop_at: usize,
        seen: Arc<Mutex<Vec<(usize, TimeDelta)>>>,
    }

    impl Node for Counter {
        fn step(&mut self, i: usize, _: TimeDelta, clock: &dyn Clock) -> Result<StepResult> {
            self.seen.lock().unwrap().push((i, clock.elapsed()));
            if i + 1 >= self.stop_at {
                Ok(StepResult::Stop)
            } else {
                Ok(StepResult::Continue)
            }
        }
    }

    struct Failing;

    impl Node for Failing {
        fn step(&mut self, i: usize, _: TimeDelta, _: &dyn Clock) -> Result<StepResult> {
            if i == 2 {
                bail!("sensor on fire");
            }
            Ok(StepResult::Continue)
        }
    }

    fn manager() -> NodeManager {
        NodeManager::new_from_seed(TelemetryService::default(), ParameterMap::default(), 42)
    }

    fn counter(nm: &mut NodeManager, stop_at: usize) -> Arc<Mutex<Vec<(usize, TimeDelta)>>> {
        let seen = Arc::new(Mutex::new(vec![]));
        let s = seen.clone();
        nm.add_node("counter", move |_: NodeContext| {
            Ok(Box::new(Counter { stop_at, seen: s }))
        })
        .unwrap();
        seen
    }

    #[test]
    fn test_stops_when_node_stops() -> Result<()> {
        let mut nm = manager();
        let seen = counter(&mut nm, 3);

        let exec = PacedExecutor::new(TimeDelta::milliseconds(10), Pacing::AsFastAsPossible);
        let steps = exec.run_blocking(nm, &AtomicBool::new(false))?;

        assert_eq!(steps, 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (0, TimeDelta::zero()),
                (1, TimeDelta::milliseconds(10)),
                (2, TimeDelta::milliseconds(20)),
            ]
        );

        Ok(())
    }

    #[test]
    fn test_max_steps_and_stop_flag() -> Result<()> {
        let mut nm = manager();
        counter(&mut nm, usize::MAX);

        let exec = PacedExecutor::new(TimeDelta::milliseconds(1), Pacing::AsFastAsPossible)
            .with_max_steps(5);
        assert_eq!(exec.run_blocking(nm, &AtomicBool::new(false))?, 5);

        let mut nm = manager();
        counter(&mut nm, usize::MAX);
        let exec = PacedExecutor::new(TimeDelta::milliseconds(1), Pacing::AsFastAsPossible);
        assert_eq!(exec.run_blocking(nm, &AtomicBool::new(true))?, 0);

        Ok(())
    }

    #[test]
    fn test_real_time_pacing() -> Result<()> {
        let mut nm = manager();
        counter(&mut nm, usize::MAX);

        let exec =
            PacedExecutor::new(TimeDelta::milliseconds(10), Pacing::RealTime).with_max_steps(5);

        let start = Instant::now();
        exec.run_blocking(nm, &AtomicBool::new(false))?;

        assert!(start.elapsed() >= std::time::Duration::from_millis(50));
        Ok(())
    }

    #[test]
    fn test_node_failure() {
        let mut nm = manager();
        nm.add_node("failing", |_| Ok(Box::new(Failing))).unwrap();

        let exec = PacedExecutor::new(TimeDelta::milliseconds(1), Pacing::AsFastAsPossible);
        let err = exec.run_blocking(nm, &AtomicBool::new(false)).unwrap_err();

        assert!(format!("{err:#}").contains("Node 'failing' failed at step 2"));
        assert!(format!("{err:#}").contains("sensor on fire"));
    }

    #[test]
    fn test_creation_failure() {
        let mut nm = manager();
        let res = nm.add_node("broken", |_| bail!("missing parameter"));

        assert!(res.is_err());
        assert!(nm.nodes().is_empty());
    }
}
