use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{debug, trace, warn};

use crate::{
    exec::{TickControl, Ticker, TimerHandle},
    stream::{BoxObserver, Event},
};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

struct ThrottleSlot<T> {
    pending: Option<T>,
    upstream_done: bool,
}

/// Throttle-last: at the end of every window emits the most recent value
/// received during it, if any.
///
/// Windows come from a periodic [`Ticker`], independent of the arrivals.
pub struct Throttler<T> {
    window: Duration,
    slot: Arc<Mutex<ThrottleSlot<T>>>,
}

impl<T: Send + 'static> Throttler<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slot: Arc::new(Mutex::new(ThrottleSlot {
                pending: None,
                upstream_done: false,
            })),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn has_pending(&self) -> bool {
        self.slot.lock().unwrap().pending.is_some()
    }

    pub fn observer(&self) -> BoxObserver<T> {
        let slot = self.slot.clone();
        Box::new(move |event: Event<T>| {
            let mut slot = slot.lock().unwrap();
            match event {
                Event::Next(value) => {
                    if slot.pending.replace(value).is_some() {
                        trace!("Superseded pending value");
                    }
                }
                Event::Error(e) => {
                    warn!("Throttled stream failed: {e}");
                    slot.upstream_done = true;
                }
                Event::Complete => slot.upstream_done = true,
            }
        })
    }

    /// Starts the window timer delivering to `downstream`. Once the upstream
    /// finished, the last pending value is emitted at the next window
    /// boundary, followed by [`Event::Complete`], and the timer stops.
    pub fn start(&self, ticker: &dyn Ticker, mut downstream: BoxObserver<T>) -> TimerHandle {
        let slot = self.slot.clone();

        ticker.start(
            self.window,
            Box::new(move || {
                let (value, done) = {
                    let mut slot = slot.lock().unwrap();
                    (slot.pending.take(), slot.upstream_done)
                };

                if let Some(value) = value {
                    downstream.on_event(Event::Next(value));
                }

                if done {
                    debug!("Throttled stream complete");
                    downstream.on_event(Event::Complete);
                    TickControl::Stop
                } else {
                    TickControl::Continue
                }
            }),
        )
    }
}
