pub mod main_loop;
pub mod ticker;
pub mod worker;

pub use main_loop::{MainLoop, MainLoopHandle};
pub use ticker::{IntervalTicker, ManualTicker, TickControl, Ticker, TimerHandle};
pub use worker::WorkerPool;

pub type Task = Box<dyn FnOnce() + Send>;

pub trait ExecutionContext: Send + Sync {
    fn execute(&self, task: Task);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

impl ExecutionContext for Immediate {
    fn execute(&self, task: Task) {
        task()
    }
}
