mod recorder;

use std::fmt;

use thiserror::Error;

pub use recorder::Recorder;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("Upstream source failed: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
    Next(T),
    Error(StreamError),
    Complete,
}

pub trait Observer<T>: Send {
    fn on_event(&mut self, event: Event<T>);
}

impl<T, F> Observer<T> for F
where
    F: FnMut(Event<T>) + Send,
{
    fn on_event(&mut self, event: Event<T>) {
        self(event)
    }
}

pub type BoxObserver<T> = Box<dyn Observer<T>>;

pub trait Source<T>: Send + Sync {
    fn subscribe(&self, observer: BoxObserver<T>) -> Subscription;
}

/// Handle to a registered observer. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn closed() -> Self {
        Self { cancel: None }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn test_closure_observer() {
        let mut seen = vec![];
        {
            let mut obs = |e: Event<i32>| seen.push(e);
            obs.on_event(Event::Next(1));
            obs.on_event(Event::Complete);
        }

        assert_eq!(seen, vec![Event::Next(1), Event::Complete]);
    }

    #[test]
    fn test_subscription_cancels_once() {
        let count = Arc::new(AtomicUsize::new(0));

        let sub = {
            let count = count.clone();
            Subscription::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };

        assert!(sub.is_active());
        sub.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        {
            let count = count.clone();
            let _sub = Subscription::new(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(!Subscription::closed().is_active());
    }
}
