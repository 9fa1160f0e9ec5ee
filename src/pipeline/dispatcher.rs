use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use log::{debug, info, warn};

use crate::{
    collector::{Ack, Collector, SubmitError},
    datatypes::CompositeSample,
    exec::ExecutionContext,
    stream::{BoxObserver, Event},
};

#[derive(Debug)]
pub struct Submission {
    pub sample: CompositeSample,
    pub result: Result<Ack, SubmitError>,
}

impl Submission {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

struct SinkInner {
    attached: AtomicBool,
    callback: Mutex<Box<dyn FnMut(Submission) + Send>>,
}

/// Caller supplied destination of the submission outcomes. Once detached,
/// outcomes are silently discarded.
#[derive(Clone)]
pub struct OutcomeSink {
    inner: Arc<SinkInner>,
}

impl OutcomeSink {
    pub fn new(callback: impl FnMut(Submission) + Send + 'static) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                attached: AtomicBool::new(true),
                callback: Mutex::new(Box::new(callback)),
            }),
        }
    }

    /// Does not wait for a delivery already in progress, so it may be called
    /// from inside the callback.
    pub fn detach(&self) {
        self.inner.attached.store(false, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst)
    }

    pub fn deliver(&self, submission: Submission) -> bool {
        let mut callback = self.inner.callback.lock().unwrap();
        if !self.is_attached() {
            return false;
        }
        (callback)(submission);
        true
    }
}

/// Counts a submission as in flight until dropped, so a task that panics or
/// is discarded by its context is released too.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Submits every sample to the collector on the worker context, then hands
/// the outcome to the sink on the completion context.
#[derive(Clone)]
pub struct Dispatcher {
    collector: Arc<dyn Collector>,
    worker: Arc<dyn ExecutionContext>,
    completion: Arc<dyn ExecutionContext>,
    sink: OutcomeSink,
    in_flight: Arc<AtomicUsize>,
}

impl Dispatcher {
    pub fn new(
        collector: Arc<dyn Collector>,
        worker: Arc<dyn ExecutionContext>,
        completion: Arc<dyn ExecutionContext>,
        sink: OutcomeSink,
    ) -> Self {
        Self {
            collector,
            worker,
            completion,
            sink,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn sink(&self) -> &OutcomeSink {
        &self.sink
    }

    pub fn dispatch(&self, sample: CompositeSample) {
        let collector = self.collector.clone();
        let completion = self.completion.clone();
        let sink = self.sink.clone();
        let in_flight = InFlight::new(self.in_flight.clone());

        debug!("Dispatching sample, heading {}", sample.orientation);

        self.worker.execute(Box::new(move || {
            let result = collector.submit(&sample);

            match &result {
                Ok(ack) => debug!("Sample submitted: {}", ack.message),
                Err(e) => warn!("Submission failed: {e}"),
            }

            completion.execute(Box::new(move || {
                if !sink.deliver(Submission { sample, result }) {
                    debug!("Outcome discarded, sink detached");
                }
                drop(in_flight);
            }));
        }));
    }

    pub fn into_observer(self) -> BoxObserver<CompositeSample> {
        Box::new(move |event: Event<CompositeSample>| match event {
            Event::Next(sample) => self.dispatch(sample),
            Event::Error(e) => warn!("Sample stream failed: {e}"),
            Event::Complete => info!("Sample stream complete, no more submissions"),
        })
    }
}
