mod executor;
mod node;

pub use executor::{PacedExecutor, Pacing};
pub use node::{BoxNode, Node, NodeContext, NodeManager, StepResult};
