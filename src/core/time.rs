use chrono::{DateTime, TimeDelta, Utc};

pub trait Clock {
    fn utc(&self) -> DateTime<Utc>;

    /// Monotonic time since the clock was started
    fn elapsed(&self) -> TimeDelta;
}

#[derive(Debug, Clone)]
pub struct SimulatedClock {
    utc_epoch: DateTime<Utc>,
    elapsed: TimeDelta,
}

impl SimulatedClock {
    pub fn new(utc_epoch: DateTime<Utc>, elapsed: TimeDelta) -> SimulatedClock {
        SimulatedClock { utc_epoch, elapsed }
    }

    pub fn step(&mut self, delta: TimeDelta) {
        self.elapsed += delta
    }
}

impl Clock for SimulatedClock {
    fn utc(&self) -> DateTime<Utc> {
        self.utc_epoch + self.elapsed
    }

    fn elapsed(&self) -> TimeDelta {
        self.elapsed
    }
}

pub fn seconds_f64(td: TimeDelta) -> f64 {
    td.num_seconds() as f64 + (td.subsec_nanos() as f64) / 1000000000.0
}

pub fn from_seconds_f64(sec: f64) -> TimeDelta {
    TimeDelta::microseconds((sec * 1000000.0).round() as i64)
}
