use std::{
    fmt,
    sync::{Arc, Mutex},
};

use crate::stream::{BoxObserver, Event, Source, StreamError, Subscription};

type ObserverSlot<T> = Arc<Mutex<Option<BoxObserver<T>>>>;

/// Broadcast channel: every value written by the single [`Publisher`] is pushed
/// synchronously to all the registered observers.
pub struct Channel<T> {
    inner: Mutex<ChannelInner<T>>,
}

struct ChannelInner<T> {
    observers: Vec<(usize, ObserverSlot<T>)>,
    counter: usize,
    is_closed: bool,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(ChannelInner {
                observers: vec![],
                counter: 0usize,
                is_closed: false,
            }),
        }
    }
}

impl<T: Clone + Send + 'static> Channel<T> {
    fn write(&self, value: T) {
        // Snapshot, so that observers can (un)subscribe while being notified
        let observers: Vec<ObserverSlot<T>> = self
            .inner
            .lock()
            .unwrap()
            .observers
            .iter()
            .map(|(_, slot)| slot.clone())
            .collect();

        for slot in observers {
            if let Some(observer) = slot.lock().unwrap().as_mut() {
                observer.on_event(Event::Next(value.clone()));
            }
        }
    }

    fn close(&self, error: Option<StreamError>) {
        let observers = {
            let mut inner = self.inner.lock().unwrap();
            if inner.is_closed {
                return;
            }
            inner.is_closed = true;
            std::mem::take(&mut inner.observers)
        };

        let last = match error {
            Some(e) => Event::Error(e),
            None => Event::Complete,
        };

        for (_, slot) in observers {
            let observer = slot.lock().unwrap().take();
            if let Some(mut observer) = observer {
                observer.on_event(last.clone());
            }
        }
    }

    /// Registers `observer`. If the channel is already closed the observer
    /// immediately receives [`Event::Complete`].
    ///
    /// An observer must not drop its own subscription from inside `on_event`.
    pub fn add_observer(this: &Arc<Channel<T>>, mut observer: BoxObserver<T>) -> Subscription {
        let mut inner = this.inner.lock().unwrap();

        if inner.is_closed {
            drop(inner);
            observer.on_event(Event::Complete);
            return Subscription::closed();
        }

        let index = inner.counter;
        inner.counter += 1;

        let slot: ObserverSlot<T> = Arc::new(Mutex::new(Some(observer)));
        inner.observers.push((index, slot.clone()));

        let channel = Arc::downgrade(this);
        Subscription::new(move || {
            if let Some(channel) = channel.upgrade() {
                channel.remove_observer(index);
            }
            // Blocks until a delivery in progress on another thread is done
            slot.lock().unwrap().take();
        })
    }
}

impl<T> Channel<T> {
    fn remove_observer(&self, index: usize) {
        let mut inner = self.inner.lock().unwrap();
        inner.observers.retain(|(i, _)| *i != index);
    }

    fn num_observers(&self) -> usize {
        self.inner.lock().unwrap().observers.len()
    }

    fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().is_closed
    }
}

pub struct Publisher<T: Clone + Send + 'static> {
    channel: Arc<Channel<T>>,
}

impl<T: Clone + Send + 'static> Publisher<T> {
    pub fn send(&self, value: T) {
        self.channel.write(value);
    }

    pub fn fail(self, error: StreamError) {
        self.channel.close(Some(error));
    }

    pub fn source(&self) -> ChannelSource<T> {
        ChannelSource {
            channel: self.channel.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("observers", &self.channel.num_observers())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Drop for Publisher<T> {
    fn drop(&mut self) {
        self.channel.close(None);
    }
}

pub struct ChannelSource<T> {
    channel: Arc<Channel<T>>,
}

impl<T> Clone for ChannelSource<T> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
        }
    }
}

impl<T> fmt::Debug for ChannelSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSource")
            .field("observers", &self.channel.num_observers())
            .field("closed", &self.channel.is_closed())
            .finish()
    }
}

impl<T> ChannelSource<T> {
    pub fn observer_count(&self) -> usize {
        self.channel.num_observers()
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}

impl<T: Clone + Send + 'static> Source<T> for ChannelSource<T> {
    fn subscribe(&self, observer: BoxObserver<T>) -> Subscription {
        Channel::add_observer(&self.channel, observer)
    }
}

pub fn channel<T: Clone + Send + 'static>() -> (Publisher<T>, ChannelSource<T>) {
    let channel = Arc::new(Channel::<T>::default());

    (
        Publisher {
            channel: channel.clone(),
        },
        ChannelSource { channel },
    )
}
