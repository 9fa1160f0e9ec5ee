#[allow(clippy::module_inception)]
pub mod parameters;

pub use parameters::{parse_string, Error, Parameter, ParameterMap, ParameterTree, ParameterValue};
