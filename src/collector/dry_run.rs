use std::sync::atomic::{AtomicUsize, Ordering};

use log::info;

use super::{Ack, Collector, SubmitError};
use crate::datatypes::CompositeSample;

#[derive(Debug, Default)]
pub struct LogCollector {
    submitted: AtomicUsize,
}

impl LogCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }
}

impl Collector for LogCollector {
    fn submit(&self, sample: &CompositeSample) -> Result<Ack, SubmitError> {
        let payload = serde_json::to_string(sample)?;
        let n = self.submitted.fetch_add(1, Ordering::Relaxed) + 1;

        info!("Sample #{n}: {payload}");

        Ok(Ack::new(format!("logged sample #{n}")))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::DateTime;

    use super::*;
    use crate::datatypes::{Heading, PositionSample};

    #[test]
    fn test_log_collector() -> Result<()> {
        let collector = LogCollector::new();
        let sample = CompositeSample::new(
            PositionSample::new(45.0, 9.0, 5.0, DateTime::UNIX_EPOCH),
            Heading::Degrees(12.5),
        );

        assert_eq!(collector.submit(&sample)?, Ack::new("logged sample #1"));
        assert_eq!(collector.submit(&sample)?, Ack::new("logged sample #2"));
        assert_eq!(collector.submitted(), 2);

        Ok(())
    }
}
