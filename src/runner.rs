use std::{
    fs,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use crate::{
    collector::{Collector, LogCollector, UdpCollector},
    core::time::from_seconds_f64,
    exec::{IntervalTicker, MainLoop, WorkerPool},
    nodes::{NodeManager, PacedExecutor, Pacing},
    parameters::{self, ParameterMap},
    pipeline::{OutcomeSink, Pipeline, PipelineConfig, PipelineContext, PipelineSources, Submission},
    sim,
    telemetry::TelemetryService,
};

/// Longest wait for the submissions still in flight once the run ended
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub enum RngSeed {
    Rand,
    Fixed(u64),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub steps: usize,
    pub submitted: usize,
    pub failed: usize,
}

pub struct UplinkRunner {
    nm: NodeManager,
    ts: TelemetryService,
    params: Arc<ParameterMap>,
    config: PipelineConfig,
    collector: Arc<dyn Collector>,
}

impl UplinkRunner {
    pub fn new(params: &Path, dry_run: bool, seed: RngSeed) -> Result<Self> {
        info!("Reading parameters from '{}'", params.display());

        let params_toml = fs::read_to_string(params)
            .with_context(|| format!("Cannot read '{}'", params.display()))?;
        let params = parameters::parse_string(&params_toml)?;
        let config = PipelineConfig::from_parameters(&params)?;

        let collector: Arc<dyn Collector> = if dry_run {
            info!("Dry run, samples are only logged");
            Arc::new(LogCollector::new())
        } else {
            let address = params.get_param("collector.address")?.value_string()?;
            let mut udp = UdpCollector::new(address.as_str())?;
            if let Some(p) = params.get_param_opt("collector.timeout_s")? {
                let timeout = Duration::try_from_secs_f64(p.value_float()?)
                    .with_context(|| format!("Invalid reply timeout '{}'", p.path()))?;
                udp = udp.with_timeout(timeout);
            }
            info!(
                "Submitting to {} (reply timeout {:?})",
                udp.remote(),
                udp.timeout()
            );
            Arc::new(udp)
        };

        let ts = TelemetryService::default();

        let mut nm = match seed {
            RngSeed::Fixed(seed) => NodeManager::new_from_seed(ts.clone(), params, seed),
            RngSeed::Rand => NodeManager::new(ts.clone(), params),
        };

        sim::build_simulation(&mut nm)?;

        Ok(Self {
            params: nm.parameters(),
            nm,
            ts,
            config,
            collector,
        })
    }

    /// Runs until `duration` of simulated time elapsed or `stop` is set
    pub fn run_blocking(
        self,
        duration: Option<Duration>,
        stop: Arc<AtomicBool>,
    ) -> Result<RunSummary> {
        let dt_sec = self.params.get_param("sim.dt")?.value_float()?;

        let mut executor = PacedExecutor::new(from_seconds_f64(dt_sec), Pacing::RealTime);
        if let Some(duration) = duration {
            executor = executor.with_max_steps((duration.as_secs_f64() / dt_sec).round() as usize);
        }

        let main_loop = MainLoop::new();
        let summary = Arc::new(Mutex::new(RunSummary::default()));

        let sink = {
            let summary = summary.clone();
            OutcomeSink::new(move |submission: Submission| {
                let mut summary = summary.lock().unwrap();
                summary.submitted += 1;
                if !submission.is_ok() {
                    summary.failed += 1;
                }
            })
        };

        let sources = PipelineSources::from_telemetry(&self.ts, &self.config.channels)?;
        let mut pipeline = Pipeline::start(
            &self.config,
            &sources,
            self.collector.clone(),
            PipelineContext {
                worker: Arc::new(WorkerPool::new(self.config.workers)),
                completion: Arc::new(main_loop.handle()),
                ticker: Arc::new(IntervalTicker),
            },
            sink,
        );

        info!("Simulation dt is {:.2} ms", dt_sec * 1000.0);

        let sim_done = Arc::new(AtomicBool::new(false));
        let simulation = {
            let nm = self.nm;
            let stop = stop.clone();
            let sim_done = sim_done.clone();

            thread::spawn(move || -> Result<usize> {
                let res = executor.run_blocking(nm, &stop);
                sim_done.store(true, Ordering::SeqCst);
                res
            })
        };

        let poll = Duration::from_millis(50);
        main_loop.run_until(|| sim_done.load(Ordering::SeqCst), poll);

        // The last window may still hold a sample
        if !stop.load(Ordering::SeqCst) {
            let flush_deadline = Instant::now() + self.config.window + poll;
            main_loop.run_until(
                || stop.load(Ordering::SeqCst) || Instant::now() >= flush_deadline,
                poll,
            );
        }

        let drain_deadline = Instant::now() + DRAIN_TIMEOUT;
        main_loop.run_until(
            || {
                pipeline.in_flight() == 0
                    || stop.load(Ordering::SeqCst)
                    || Instant::now() >= drain_deadline
            },
            poll,
        );
        if pipeline.in_flight() > 0 {
            warn!("{} submissions still in flight, outcomes discarded", pipeline.in_flight());
        }

        pipeline.stop();

        let steps = simulation
            .join()
            .map_err(|_| anyhow!("Simulation thread panicked"))??;

        let mut summary = *summary.lock().unwrap();
        summary.steps = steps;

        info!(
            "Run ended after {steps} steps: {} samples submitted, {} failed",
            summary.submitted, summary.failed
        );

        Ok(summary)
    }
}
