use crate::error::Result;
use crate::types::{Extension, Fields};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Scoring capability of a parsed model.
///
/// Implementations must be safe to call from many threads at once; the
/// orchestrator fans a single request out across versions in parallel.
pub trait Evaluator: Send + Sync {
    /// Input fields the model reads. Missing request values are still passed
    /// to [`Evaluator::prepare`] as `None`.
    fn required_fields(&self) -> Vec<String>;

    /// Fields the model predicts.
    fn predicted_fields(&self) -> Vec<String>;

    /// Additional output fields derived from the prediction.
    fn output_fields(&self) -> Vec<String>;

    /// Coerce and validate a raw request value for one input field.
    fn prepare(&self, field: &str, raw: Option<&Value>) -> Result<Value>;

    /// Score a set of prepared inputs.
    fn evaluate(&self, inputs: &HashMap<String, Value>) -> Result<Fields>;
}

/// A model definition turned into an evaluator plus its header metadata.
pub struct ParsedModel {
    pub evaluator: Arc<dyn Evaluator>,
    pub extensions: Vec<Extension>,
}

/// Builds evaluators from raw model definitions. Only invoked on deploy.
pub trait ModelParser: Send + Sync {
    fn parse(&self, definition: &[u8]) -> Result<ParsedModel>;
}
