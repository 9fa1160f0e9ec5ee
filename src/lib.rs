pub mod channels;
pub mod collector;
pub mod core;
pub mod datatypes;
pub mod exec;
pub mod nodes;
pub mod parameters;
pub mod pipeline;
pub mod runner;
pub mod sim;
pub mod stream;
pub mod telemetry;
pub mod utils;
