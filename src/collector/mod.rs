mod dry_run;
mod udp;

use std::time::Duration;

use thiserror::Error;

use crate::datatypes::CompositeSample;

pub use dry_run::LogCollector;
pub use udp::{Reply, UdpCollector, DEFAULT_REPLY_TIMEOUT, MAX_DATAGRAM_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Could not serialize the sample: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Collector rejected the sample: {0}")]
    Rejected(String),

    #[error("No reply from the collector within {0:?}")]
    Timeout(Duration),

    #[error("Invalid reply from the collector: {0}")]
    InvalidReply(String),
}

/// Blocking submission of one sample. Called from worker threads, possibly
/// several at the same time.
pub trait Collector: Send + Sync {
    fn submit(&self, sample: &CompositeSample) -> Result<Ack, SubmitError>;
}
