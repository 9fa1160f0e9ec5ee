use std::{
    io,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    time::Duration,
};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{Ack, Collector, SubmitError};
use crate::datatypes::CompositeSample;

pub const MAX_DATAGRAM_SIZE: usize = 65_507;

pub const MAX_REPLY_SIZE: usize = 4096;

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub accepted: bool,
    #[serde(default)]
    pub message: String,
}

impl Reply {
    pub fn accept(message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            message: message.into(),
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

/// Sends every sample as one JSON datagram and waits for the collector's
/// [`Reply`]. Each submission uses its own socket, so concurrent submissions
/// never see each other's replies.
#[derive(Debug, Clone)]
pub struct UdpCollector {
    remote: SocketAddr,
    timeout: Duration,
}

impl UdpCollector {
    pub fn new(remote: impl ToSocketAddrs) -> Result<Self, SubmitError> {
        let remote = remote.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
        })?;

        Ok(Self {
            remote,
            timeout: DEFAULT_REPLY_TIMEOUT,
        })
    }

    /// Zero is ignored
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn connect(&self) -> io::Result<UdpSocket> {
        let local = if self.remote.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(self.remote)?;
        socket.set_read_timeout(Some(self.timeout))?;
        Ok(socket)
    }
}

impl Collector for UdpCollector {
    fn submit(&self, sample: &CompositeSample) -> Result<Ack, SubmitError> {
        let payload = serde_json::to_vec(sample)?;

        if payload.len() > MAX_DATAGRAM_SIZE {
            return Err(SubmitError::Rejected(format!(
                "payload of {} bytes does not fit a datagram",
                payload.len()
            )));
        }

        let socket = self.connect()?;
        let n = socket.send(&payload)?;
        debug!("Sent {n} bytes to {}", self.remote);

        let mut buf = [0u8; MAX_REPLY_SIZE];
        let len = match socket.recv(&mut buf) {
            Ok(len) => len,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Err(SubmitError::Timeout(self.timeout));
            }
            Err(e) => return Err(e.into()),
        };

        let reply: Reply = serde_json::from_slice(&buf[..len])
            .map_err(|e| SubmitError::InvalidReply(e.to_string()))?;

        if reply.accepted {
            Ok(Ack::new(reply.message))
        } else {
            Err(SubmitError::Rejected(reply.message))
        }
    }
}
