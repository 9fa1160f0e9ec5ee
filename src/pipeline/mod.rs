pub mod combiner;
pub mod config;
pub mod dispatcher;
pub mod estimator;
pub mod filter;
pub mod throttler;

use std::sync::Arc;

use log::info;

pub use combiner::{CombineLatest, StreamCombiner};
pub use config::{ChannelConfig, ConfigError, PipelineConfig};
pub use dispatcher::{Dispatcher, OutcomeSink, Submission};
pub use estimator::{Attitude, OrientationEstimator};
pub use filter::SampleFilter;
pub use throttler::Throttler;

use crate::{
    collector::Collector,
    datatypes::{Heading, MotionVector, PositionSample},
    exec::{ExecutionContext, Ticker, TimerHandle},
    stream::{Source, Subscription},
    telemetry::{TelemetryError, TelemetryService},
};

pub struct PipelineSources {
    pub position: Box<dyn Source<PositionSample>>,
    pub acceleration: Box<dyn Source<MotionVector>>,
    pub magnetic_field: Box<dyn Source<MotionVector>>,
}

impl PipelineSources {
    pub fn from_telemetry(
        ts: &TelemetryService,
        channels: &ChannelConfig,
    ) -> Result<Self, TelemetryError> {
        Ok(Self {
            position: Box::new(ts.subscribe::<PositionSample>(&channels.position)?),
            acceleration: Box::new(ts.subscribe::<MotionVector>(&channels.acceleration)?),
            magnetic_field: Box::new(ts.subscribe::<MotionVector>(&channels.magnetic_field)?),
        })
    }
}

/// Where the pipeline runs: submissions on `worker`, outcomes on
/// `completion`, throttle windows from `ticker`
#[derive(Clone)]
pub struct PipelineContext {
    pub worker: Arc<dyn ExecutionContext>,
    pub completion: Arc<dyn ExecutionContext>,
    pub ticker: Arc<dyn Ticker>,
}

/// A running pipeline. Stopped on drop.
pub struct Pipeline {
    subscriptions: Vec<Subscription>,
    timer: Option<TimerHandle>,
    dispatcher: Dispatcher,
    stopped: bool,
}

impl Pipeline {
    pub fn start(
        config: &PipelineConfig,
        sources: &PipelineSources,
        collector: Arc<dyn Collector>,
        context: PipelineContext,
        sink: OutcomeSink,
    ) -> Self {
        let dispatcher = Dispatcher::new(collector, context.worker, context.completion, sink);

        let throttler = Throttler::new(config.window);
        let timer = throttler.start(context.ticker.as_ref(), dispatcher.clone().into_observer());

        let combiner = StreamCombiner::composite(throttler.observer());

        let estimator = OrientationEstimator::new();
        let heading = CombineLatest::<MotionVector, MotionVector, Heading>::new(
            move |acc: &MotionVector, mag: &MotionVector| estimator.estimate(acc, mag),
            combiner.heading_observer(),
        );

        let filter = SampleFilter::new(config.accuracy_threshold_m);

        let subscriptions = vec![
            sources
                .position
                .subscribe(filter.into_observer(combiner.position_observer())),
            sources.acceleration.subscribe(heading.left_observer()),
            sources.magnetic_field.subscribe(heading.right_observer()),
        ];

        info!(
            "Pipeline started: accuracy threshold {} m, window {:?}",
            config.accuracy_threshold_m, config.window
        );

        Self {
            subscriptions,
            timer: Some(timer),
            dispatcher,
            stopped: false,
        }
    }

    /// Releases the sources, stops the window timer and detaches the outcome
    /// sink. Submissions in flight complete, but their outcome is discarded.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        self.subscriptions.clear();
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
        self.dispatcher.sink().detach();

        info!("Pipeline stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
