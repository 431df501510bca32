pub mod types;
pub mod error;
pub mod evaluator;
pub mod threshold;
pub mod registry;
pub mod orchestrator;
pub mod regression;

pub use error::{VerdictError, Result};
pub use types::*;
pub use evaluator::{Evaluator, ModelParser, ParsedModel};
pub use registry::ModelRegistry;
pub use orchestrator::{Orchestrator, normalize_parameters};
pub use regression::{RegressionDefinition, RegressionModel, RegressionParser};

#[cfg(test)]
pub(crate) mod testing;
