//! Stub evaluator used by unit tests.
//!
//! The definition `b"ok"` yields a model predicting `p = 0.5`; any other
//! definition must be a JSON [`StubSpec`].

use crate::error::{Result, VerdictError};
use crate::evaluator::{Evaluator, ModelParser, ParsedModel};
use crate::registry::ModelRegistry;
use crate::types::{Extension, Fields};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StubSpec {
    pub field: String,
    pub value: f64,
    #[serde(default)]
    pub fail: bool,
    #[serde(default)]
    pub required: Vec<String>,
    /// Required fields whose preparation always fails.
    #[serde(default)]
    pub reject: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

impl Default for StubSpec {
    fn default() -> Self {
        Self {
            field: "p".into(),
            value: 0.5,
            fail: false,
            required: Vec::new(),
            reject: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

/// Predicts `spec.value` under `spec.field` and echoes every prepared input
/// back as an output so tests can observe what the evaluator received.
pub struct StubEvaluator {
    spec: StubSpec,
}

impl Evaluator for StubEvaluator {
    fn required_fields(&self) -> Vec<String> {
        self.spec.required.clone()
    }

    fn predicted_fields(&self) -> Vec<String> {
        vec![self.spec.field.clone()]
    }

    fn output_fields(&self) -> Vec<String> {
        Vec::new()
    }

    fn prepare(&self, field: &str, raw: Option<&Value>) -> Result<Value> {
        if self.spec.reject.iter().any(|r| r == field) {
            return Err(VerdictError::validation(field, "rejected by stub"));
        }
        Ok(raw.cloned().unwrap_or(Value::Null))
    }

    fn evaluate(&self, inputs: &HashMap<String, Value>) -> Result<Fields> {
        if self.spec.fail {
            return Err(VerdictError::Evaluation("stub failure".into()));
        }
        let mut out: Fields = inputs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        out.insert(self.spec.field.clone(), Value::from(self.spec.value));
        Ok(out)
    }
}

pub struct StubParser;

impl ModelParser for StubParser {
    fn parse(&self, definition: &[u8]) -> Result<ParsedModel> {
        let spec = if definition == b"ok" {
            StubSpec::default()
        } else {
            serde_json::from_slice::<StubSpec>(definition)?
        };
        let extensions = spec.extensions.clone();
        Ok(ParsedModel {
            evaluator: Arc::new(StubEvaluator { spec }),
            extensions,
        })
    }
}

pub fn stub_registry() -> ModelRegistry {
    ModelRegistry::new(Arc::new(StubParser))
}

pub fn spec_bytes(spec: &StubSpec) -> Vec<u8> {
    serde_json::to_vec(spec).expect("stub spec serializes")
}

/// A stub predicting `value` under `field`, with `field` as its score and a
/// `trueIfAbove` bound of 0.5.
pub fn stub_definition(field: &str, value: f64) -> Vec<u8> {
    spec_bytes(&StubSpec {
        field: field.into(),
        value,
        extensions: vec![
            Extension::new("useAsScore", field),
            Extension::new("trueIfAbove", "0.5"),
        ],
        ..Default::default()
    })
}

/// A stub whose evaluation always fails.
pub fn failing_definition() -> Vec<u8> {
    spec_bytes(&StubSpec {
        fail: true,
        ..Default::default()
    })
}
