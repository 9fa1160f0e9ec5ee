use std::{
    any::{type_name, Any},
    collections::HashMap,
    sync::{Arc, Mutex},
};

use thiserror::Error;

use crate::utils::channel::{channel, ChannelSource, Publisher};

#[derive(PartialEq, Eq, Error, Debug)]
pub enum TelemetryError {
    #[error("Requested channel type '{requested}', but channel is a '{expected}'")]
    WrongChannelType { requested: String, expected: String },

    #[error("Cannot create more than one producer for a channel")]
    AlreadyHasProducer,

    #[error("Provided channel name '{0}' is not valid")]
    InvalidChannelName(String),
}

/// Channel names are absolute, slash separated paths: "/sensors/position"
pub fn validate_channel_name(name: &str) -> bool {
    name.starts_with('/')
        && name.len() > 1
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '/')
}

#[derive(Debug)]
struct TelemetryChannel {
    typename: String,

    transport: Box<dyn Any + Send>, // Box<TelemetryChannelTransport<T>>
}

struct TelemetryChannelTransport<T: Clone + Send + 'static> {
    source: ChannelSource<T>,
    publisher: Option<Publisher<T>>,
}

impl TelemetryChannel {
    fn new<T: Clone + Send + 'static>() -> Self {
        let (publisher, source) = channel::<T>();

        Self {
            typename: type_name::<T>().to_string(),
            transport: Box::new(TelemetryChannelTransport::<T> {
                source,
                publisher: Some(publisher),
            }),
        }
    }

    fn take_producer<T: Clone + Send + 'static>(&mut self) -> Result<Publisher<T>, TelemetryError> {
        self.downcast_mut::<T>()?
            .publisher
            .take()
            .ok_or(TelemetryError::AlreadyHasProducer)
    }

    fn source<T: Clone + Send + 'static>(&mut self) -> Result<ChannelSource<T>, TelemetryError> {
        Ok(self.downcast_mut::<T>()?.source.clone())
    }

    fn downcast_mut<T: Clone + Send + 'static>(
        &mut self,
    ) -> Result<&mut TelemetryChannelTransport<T>, TelemetryError> {
        self.transport
            .downcast_mut::<TelemetryChannelTransport<T>>()
            .ok_or(TelemetryError::WrongChannelType {
                requested: type_name::<T>().to_string(),
                expected: self.typename.clone(),
            })
    }
}

#[derive(Debug, Default, Clone)]
pub struct TelemetryService {
    inner: Arc<Mutex<TelemetryServiceInner>>,
}

#[derive(Debug, Default)]
struct TelemetryServiceInner {
    remap: HashMap<String, String>,
    channels: HashMap<String, TelemetryChannel>,
}

impl TelemetryService {
    /// `remap` redirects both producers and subscribers of a channel name to
    /// another channel
    pub fn new(remap: HashMap<String, String>) -> Self {
        TelemetryService {
            inner: Arc::new(Mutex::new(TelemetryServiceInner {
                remap,
                channels: HashMap::new(),
            })),
        }
    }

    pub fn publish<T: Clone + Send + 'static>(
        &self,
        channel_name: &str,
    ) -> Result<Publisher<T>, TelemetryError> {
        let mut inner = self.inner.lock().unwrap();
        inner.get_channel::<T>(channel_name)?.take_producer()
    }

    pub fn subscribe<T: Clone + Send + 'static>(
        &self,
        channel_name: &str,
    ) -> Result<ChannelSource<T>, TelemetryError> {
        let mut inner = self.inner.lock().unwrap();
        inner.get_channel::<T>(channel_name)?.source()
    }

    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().unwrap().channels.keys().cloned().collect();
        names.sort();
        names
    }
}

impl TelemetryServiceInner {
    fn get_channel<T: Clone + Send + 'static>(
        &mut self,
        channel_name: &str,
    ) -> Result<&mut TelemetryChannel, TelemetryError> {
        let name = self
            .remap
            .get(channel_name)
            .cloned()
            .unwrap_or_else(|| channel_name.to_string());

        if !validate_channel_name(&name) {
            return Err(TelemetryError::InvalidChannelName(name));
        }

        Ok(self
            .channels
            .entry(name)
            .or_insert_with(TelemetryChannel::new::<T>))
    }
}
