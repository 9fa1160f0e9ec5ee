use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::{
    datatypes::{CompositeSample, Heading, PositionSample},
    stream::{BoxObserver, Event},
};

type CombineFn<A, B, O> = Box<dyn FnMut(&A, &B) -> O + Send>;

struct Side<T> {
    latest: Option<T>,
    done: bool,
}

impl<T> Default for Side<T> {
    fn default() -> Self {
        Self {
            latest: None,
            done: false,
        }
    }
}

impl<T> Side<T> {
    /// A side that finished without a value can never contribute
    fn is_dead(&self) -> bool {
        self.done && self.latest.is_none()
    }
}

struct CombineState<A, B, O> {
    left: Side<A>,
    right: Side<B>,
    combine: CombineFn<A, B, O>,
    downstream: BoxObserver<O>,
    completed: bool,
}

impl<A, B, O> CombineState<A, B, O> {
    fn emit(&mut self) {
        if self.completed {
            return;
        }
        if let (Some(a), Some(b)) = (&self.left.latest, &self.right.latest) {
            let out = (self.combine)(a, b);
            self.downstream.on_event(Event::Next(out));
        }
    }

    fn check_completion(&mut self) {
        if self.completed {
            return;
        }

        let both_done = self.left.done && self.right.done;
        if both_done || self.left.is_dead() || self.right.is_dead() {
            self.completed = true;
            debug!("Combined stream complete");
            self.downstream.on_event(Event::Complete);
        }
    }
}

/// Combine-latest of two streams: once both sides produced a value, every new
/// value on either side emits the combination of the latest pair.
///
/// A side that completes or fails keeps its last value. The output completes
/// when both sides are done, or as soon as a side finishes without ever having
/// produced a value.
pub struct CombineLatest<A, B, O> {
    state: Arc<Mutex<CombineState<A, B, O>>>,
}

impl<A, B, O> Clone for CombineLatest<A, B, O> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<A, B, O> CombineLatest<A, B, O>
where
    A: Send + 'static,
    B: Send + 'static,
    O: 'static,
{
    pub fn new(
        combine: impl FnMut(&A, &B) -> O + Send + 'static,
        downstream: BoxObserver<O>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CombineState {
                left: Side::default(),
                right: Side::default(),
                combine: Box::new(combine),
                downstream,
                completed: false,
            })),
        }
    }

    pub fn left_observer(&self) -> BoxObserver<A> {
        let state = self.state.clone();
        Box::new(move |event: Event<A>| {
            let mut s = state.lock().unwrap();
            match event {
                Event::Next(a) => {
                    if !s.left.done {
                        s.left.latest = Some(a);
                        s.emit();
                    }
                }
                Event::Error(e) => {
                    warn!("Left input of combined stream failed: {e}");
                    s.left.done = true;
                    s.check_completion();
                }
                Event::Complete => {
                    s.left.done = true;
                    s.check_completion();
                }
            }
        })
    }

    pub fn right_observer(&self) -> BoxObserver<B> {
        let state = self.state.clone();
        Box::new(move |event: Event<B>| {
            let mut s = state.lock().unwrap();
            match event {
                Event::Next(b) => {
                    if !s.right.done {
                        s.right.latest = Some(b);
                        s.emit();
                    }
                }
                Event::Error(e) => {
                    warn!("Right input of combined stream failed: {e}");
                    s.right.done = true;
                    s.check_completion();
                }
                Event::Complete => {
                    s.right.done = true;
                    s.check_completion();
                }
            }
        })
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().unwrap().completed
    }
}

/// Pairs the latest filtered position with the latest heading
pub type StreamCombiner = CombineLatest<PositionSample, Heading, CompositeSample>;

impl StreamCombiner {
    pub fn composite(downstream: BoxObserver<CompositeSample>) -> Self {
        Self::new(
            |position: &PositionSample, heading: &Heading| {
                CompositeSample::new(position.clone(), *heading)
            },
            downstream,
        )
    }

    pub fn position_observer(&self) -> BoxObserver<PositionSample> {
        self.left_observer()
    }

    pub fn heading_observer(&self) -> BoxObserver<Heading> {
        self.right_observer()
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::stream::{Recorder, StreamError};

    fn sum(rec: &Recorder<i32>) -> CombineLatest<i32, i32, i32> {
        CombineLatest::new(|a: &i32, b: &i32| a * 10 + b, rec.observer())
    }

    #[test]
    fn test_waits_for_both_sides() {
        let rec = Recorder::new();
        let c = sum(&rec);
        let mut left = c.left_observer();
        let mut right = c.right_observer();

        left.on_event(Event::Next(1));
        left.on_event(Event::Next(2));
        assert!(rec.is_empty());

        right.on_event(Event::Next(5));
        assert_eq!(rec.values(), vec![25]);
    }

    #[test]
    fn test_order_does_not_matter() {
        let rec = Recorder::new();
        let c = sum(&rec);
        let mut left = c.left_observer();
        let mut right = c.right_observer();

        right.on_event(Event::Next(7));
        right.on_event(Event::Next(8));
        assert!(rec.is_empty());

        left.on_event(Event::Next(3));
        assert_eq!(rec.values(), vec![38]);
    }

    #[test]
    fn test_latest_values() {
        let rec = Recorder::new();
        let c = sum(&rec);
        let mut left = c.left_observer();
        let mut right = c.right_observer();

        left.on_event(Event::Next(1));
        right.on_event(Event::Next(1));
        right.on_event(Event::Next(2));
        left.on_event(Event::Next(3));
        left.on_event(Event::Next(4));
        right.on_event(Event::Next(5));

        assert_eq!(rec.values(), vec![11, 12, 32, 42, 45]);
    }

    #[test]
    fn test_finished_side_keeps_last_value() {
        let rec = Recorder::new();
        let c = sum(&rec);
        let mut left = c.left_observer();
        let mut right = c.right_observer();

        left.on_event(Event::Next(1));
        right.on_event(Event::Next(2));
        right.on_event(Event::Error(StreamError::Upstream("sensor off".to_string())));

        left.on_event(Event::Next(3));
        left.on_event(Event::Next(4));

        assert_eq!(rec.values(), vec![12, 32, 42]);
        assert!(!rec.is_complete());

        left.on_event(Event::Complete);
        assert!(rec.is_complete());
        assert!(c.is_complete());
    }

    #[test]
    fn test_side_finishing_empty_completes() {
        let rec = Recorder::new();
        let c = sum(&rec);
        let mut left = c.left_observer();
        let mut right = c.right_observer();

        left.on_event(Event::Next(1));
        right.on_event(Event::Complete);

        assert_eq!(rec.events(), vec![Event::Complete]);

        // Nothing after completion
        left.on_event(Event::Next(2));
        left.on_event(Event::Complete);
        assert_eq!(rec.events(), vec![Event::Complete]);
    }

    #[test]
    fn test_composite() {
        let rec = Recorder::new();
        let c = StreamCombiner::composite(rec.observer());
        let mut position = c.position_observer();
        let mut heading = c.heading_observer();

        let fix = PositionSample::new(45.0, 9.0, 5.0, DateTime::UNIX_EPOCH);

        heading.on_event(Event::Next(Heading::Undetermined));
        position.on_event(Event::Next(fix.clone()));
        heading.on_event(Event::Next(Heading::Degrees(90.0)));

        assert_eq!(
            rec.values(),
            vec![
                CompositeSample::new(fix.clone(), Heading::Undetermined),
                CompositeSample::new(fix, Heading::Degrees(90.0)),
            ]
        );
    }
}
