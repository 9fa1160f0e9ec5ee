use log::trace;

use crate::{
    datatypes::PositionSample,
    stream::{BoxObserver, Event},
};

pub const DEFAULT_THRESHOLD_M: f64 = 20.0;

/// Lets through the position fixes whose accuracy radius is strictly below
/// the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleFilter {
    threshold_m: f64,
}

impl Default for SampleFilter {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_M)
    }
}

impl SampleFilter {
    pub fn new(threshold_m: f64) -> Self {
        Self { threshold_m }
    }

    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    /// False for a NaN accuracy as well
    pub fn accepts(&self, sample: &PositionSample) -> bool {
        sample.accuracy_m < self.threshold_m
    }

    pub fn into_observer(
        self,
        mut downstream: BoxObserver<PositionSample>,
    ) -> BoxObserver<PositionSample> {
        Box::new(move |event: Event<PositionSample>| match event {
            Event::Next(sample) => {
                if self.accepts(&sample) {
                    downstream.on_event(Event::Next(sample));
                } else {
                    trace!(
                        "Dropped position fix with accuracy {:.1} m (threshold {:.1} m)",
                        sample.accuracy_m,
                        self.threshold_m
                    );
                }
            }
            other => downstream.on_event(other),
        })
    }
}
