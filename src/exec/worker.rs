use std::{
    panic::{self, AssertUnwindSafe},
    thread::{self, JoinHandle},
};

use log::{debug, error, warn};

use super::{ExecutionContext, Task};

pub struct WorkerPool {
    sender: Option<flume::Sender<Task>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let (sender, receiver) = flume::unbounded::<Task>();

        let handles = (0..workers.max(1))
            .map(|i| {
                let receiver = receiver.clone();
                thread::spawn(move || {
                    debug!("Worker {i} started");
                    while let Ok(task) = receiver.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                            error!("Worker {i}: task panicked");
                        }
                    }
                    debug!("Worker {i} stopped");
                })
            })
            .collect();

        Self {
            sender: Some(sender),
            handles,
        }
    }

    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }
}

impl ExecutionContext for WorkerPool {
    fn execute(&self, task: Task) {
        match &self.sender {
            Some(sender) => {
                if sender.send(task).is_err() {
                    warn!("Worker pool is shut down, task dropped");
                }
            }
            None => warn!("Worker pool is shut down, task dropped"),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());

        let current = thread::current().id();
        for handle in self.handles.drain(..) {
            // Dropped from inside one of our own tasks: cannot join ourselves
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
    }
}
