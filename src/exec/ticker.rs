use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

pub type TickFn = Box<dyn FnMut() -> TickControl + Send>;

pub trait Ticker: Send + Sync {
    /// Calls `on_tick` at the end of every `period`, until it returns
    /// [`TickControl::Stop`] or the returned handle is dropped.
    fn start(&self, period: Duration, on_tick: TickFn) -> TimerHandle;
}

#[must_use = "dropping a TimerHandle stops the timer"]
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn stop(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Ticks from a dedicated thread, on a fixed grid anchored at the start time:
/// a slow `on_tick` does not shift the following deadlines.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntervalTicker;

impl Ticker for IntervalTicker {
    fn start(&self, period: Duration, mut on_tick: TickFn) -> TimerHandle {
        let (stop_tx, stop_rx) = flume::bounded::<()>(1);

        let handle: JoinHandle<()> = thread::spawn(move || {
            let mut deadline = Instant::now() + period;
            loop {
                match stop_rx.recv_deadline(deadline) {
                    Err(flume::RecvTimeoutError::Timeout) => {
                        if on_tick() == TickControl::Stop {
                            debug!("Timer stopped by its callback");
                            break;
                        }
                        deadline += period;
                    }
                    // Stop requested or handle dropped
                    _ => break,
                }
            }
        });

        TimerHandle::new(move || {
            let _ = stop_tx.try_send(());
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        })
    }
}

struct ManualTimer {
    id: usize,
    period: Duration,
    on_tick: TickFn,
}

#[derive(Default)]
struct ManualTickerInner {
    timers: Vec<ManualTimer>,
    cancelled: HashSet<usize>,
    counter: usize,
}

/// Ticker driven by hand, one [`ManualTicker::tick`] per elapsed period.
#[derive(Clone, Default)]
pub struct ManualTicker {
    inner: Arc<Mutex<ManualTickerInner>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) {
        // Callbacks run unlocked, they may start or stop timers themselves
        let running = std::mem::take(&mut self.inner.lock().unwrap().timers);

        let mut alive = vec![];
        for mut timer in running {
            if (timer.on_tick)() == TickControl::Continue {
                alive.push(timer);
            }
        }

        let mut inner = self.inner.lock().unwrap();
        let cancelled = std::mem::take(&mut inner.cancelled);
        alive.retain(|t| !cancelled.contains(&t.id));

        let started_meanwhile = std::mem::replace(&mut inner.timers, alive);
        inner.timers.extend(started_meanwhile);
    }

    pub fn active_timers(&self) -> usize {
        self.inner.lock().unwrap().timers.len()
    }

    pub fn periods(&self) -> Vec<Duration> {
        self.inner
            .lock()
            .unwrap()
            .timers
            .iter()
            .map(|t| t.period)
            .collect()
    }
}

impl Ticker for ManualTicker {
    fn start(&self, period: Duration, on_tick: TickFn) -> TimerHandle {
        let id = {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.counter;
            inner.counter += 1;
            inner.timers.push(ManualTimer {
                id,
                period,
                on_tick,
            });
            id
        };

        let inner = self.inner.clone();
        TimerHandle::new(move || {
            let mut inner = inner.lock().unwrap();
            let before = inner.timers.len();
            inner.timers.retain(|t| t.id != id);

            // Currently ticking, drop it once its callback returns
            if inner.timers.len() == before {
                inner.cancelled.insert(id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting(count: &Arc<AtomicUsize>, stop_after: usize) -> TickFn {
        let count = count.clone();
        Box::new(move || {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= stop_after {
                TickControl::Stop
            } else {
                TickControl::Continue
            }
        })
    }

    #[test]
    fn test_manual_ticker() {
        let ticker = ManualTicker::new();
        let count = Arc::new(AtomicUsize::new(0));

        let handle = ticker.start(Duration::from_secs(5), counting(&count, 100));
        assert_eq!(ticker.periods(), vec![Duration::from_secs(5)]);

        ticker.tick();
        ticker.tick();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        handle.stop();
        assert_eq!(ticker.active_timers(), 0);

        ticker.tick();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_manual_ticker_stop_from_callback() {
        let ticker = ManualTicker::new();
        let count = Arc::new(AtomicUsize::new(0));

        let _handle = ticker.start(Duration::from_secs(1), counting(&count, 2));

        ticker.tick();
        ticker.tick();
        ticker.tick();

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(ticker.active_timers(), 0);
    }

    #[test]
    fn test_manual_ticker_cancel_while_ticking() {
        let ticker = ManualTicker::new();
        let slot: Arc<Mutex<Option<TimerHandle>>> = Arc::new(Mutex::new(None));

        let handle = {
            let slot = slot.clone();
            ticker.start(
                Duration::from_secs(1),
                Box::new(move || {
                    slot.lock().unwrap().take();
                    TickControl::Continue
                }),
            )
        };
        *slot.lock().unwrap() = Some(handle);

        ticker.tick();
        assert_eq!(ticker.active_timers(), 0);
    }

    #[test]
    fn test_interval_ticker() {
        let count = Arc::new(AtomicUsize::new(0));

        let handle = IntervalTicker.start(Duration::from_millis(10), counting(&count, 1000));
        thread::sleep(Duration::from_millis(105));
        handle.stop();

        let n = count.load(Ordering::SeqCst);
        assert!(n >= 3, "ticked only {n} times");

        // No more ticks after stop
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), n);
    }

    #[test]
    fn test_interval_ticker_stops_itself() {
        let count = Arc::new(AtomicUsize::new(0));

        let _handle = IntervalTicker.start(Duration::from_millis(5), counting(&count, 3));
        thread::sleep(Duration::from_millis(60));

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
