use std::time::{Duration, Instant};

use super::{ExecutionContext, Task};

/// Task queue drained by the thread that owns it, the way a UI main loop is.
/// Other threads post work through a [`MainLoopHandle`].
pub struct MainLoop {
    sender: flume::Sender<Task>,
    receiver: flume::Receiver<Task>,
}

#[derive(Clone)]
pub struct MainLoopHandle {
    sender: flume::Sender<Task>,
}

impl Default for MainLoop {
    fn default() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self { sender, receiver }
    }
}

impl MainLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> MainLoopHandle {
        MainLoopHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn run_pending(&self) -> usize {
        let mut n = 0;
        while let Ok(task) = self.receiver.try_recv() {
            task();
            n += 1;
        }
        n
    }

    /// Runs tasks as they arrive until `done` returns true. `done` is checked
    /// after every task and at least every `poll`.
    pub fn run_until(&self, mut done: impl FnMut() -> bool, poll: Duration) -> usize {
        let mut n = 0;
        while !done() {
            if let Ok(task) = self.receiver.recv_deadline(Instant::now() + poll) {
                task();
                n += 1;
            }
        }
        n
    }
}

impl ExecutionContext for MainLoopHandle {
    fn execute(&self, task: Task) {
        // Only fails once the MainLoop is gone
        let _ = self.sender.send(task);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        thread,
    };

    use super::*;

    #[test]
    fn test_tasks_run_on_owner_thread() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let seen = Arc::new(Mutex::new(vec![]));

        let poster = {
            let seen = seen.clone();
            thread::spawn(move || {
                for i in 0..3 {
                    let seen = seen.clone();
                    handle.execute(Box::new(move || {
                        seen.lock().unwrap().push((i, thread::current().id()))
                    }));
                }
            })
        };
        poster.join().unwrap();

        // Nothing runs until the owner drains the queue
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(main_loop.run_pending(), 3);

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(seen.iter().all(|(_, id)| *id == thread::current().id()));
    }

    #[test]
    fn test_run_until() {
        let main_loop = MainLoop::new();
        let handle = main_loop.handle();
        let count = Arc::new(AtomicUsize::new(0));

        let poster = {
            let count = count.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    let count = count.clone();
                    handle.execute(Box::new(move || {
                        count.fetch_add(1, Ordering::SeqCst);
                    }));
                    thread::sleep(Duration::from_millis(5));
                }
            })
        };

        let ran = main_loop.run_until(
            || count.load(Ordering::SeqCst) == 5,
            Duration::from_millis(10),
        );

        assert_eq!(ran, 5);
        poster.join().unwrap();
    }
}
