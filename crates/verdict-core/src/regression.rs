//! JSON-defined regression models.
//!
//! A small, self-contained model format so the server can score something
//! without an external modelling library:
//!
//! ```json
//! {
//!   "extensions": [{ "name": "useAsScore", "value": "probability" }],
//!   "inputs": [
//!     { "name": "income", "type": "numeric" },
//!     { "name": "student", "type": "categorical", "values": ["true", "false"] }
//!   ],
//!   "target": "default",
//!   "intercept": -2.0,
//!   "numeric": { "income": 0.00003 },
//!   "categorical": { "student": { "true": 0.6 } },
//!   "link": "logistic",
//!   "outputs": ["probability"]
//! }
//! ```

use crate::error::{Result, VerdictError};
use crate::evaluator::{Evaluator, ModelParser, ParsedModel};
use crate::types::{Extension, Fields};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Numeric,
    Categorical,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    #[default]
    Identity,
    Logistic,
}

impl Link {
    fn apply(self, x: f64) -> f64 {
        match self {
            Link::Identity => x,
            Link::Logistic => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InputField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Allowed categories. Empty accepts any value.
    #[serde(default)]
    pub values: Vec<String>,
    /// Optional inputs contribute nothing when missing instead of failing.
    #[serde(default)]
    pub optional: bool,
}

/// The on-the-wire model document.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegressionDefinition {
    #[serde(default)]
    pub extensions: Vec<Extension>,
    pub inputs: Vec<InputField>,
    pub target: String,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub numeric: HashMap<String, f64>,
    #[serde(default)]
    pub categorical: HashMap<String, HashMap<String, f64>>,
    #[serde(default)]
    pub link: Link,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl RegressionDefinition {
    fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(VerdictError::Parse("model target must not be empty".into()));
        }

        let input_type = |name: &str| {
            self.inputs
                .iter()
                .find(|f| f.name == name)
                .map(|f| f.field_type)
        };

        for name in self.numeric.keys() {
            if input_type(name) != Some(FieldType::Numeric) {
                return Err(VerdictError::Parse(format!(
                    "numeric coefficient '{}' does not name a numeric input",
                    name
                )));
            }
        }
        for name in self.categorical.keys() {
            if input_type(name) != Some(FieldType::Categorical) {
                return Err(VerdictError::Parse(format!(
                    "categorical coefficients '{}' do not name a categorical input",
                    name
                )));
            }
        }
        if self.outputs.iter().any(|o| *o == self.target) {
            return Err(VerdictError::Parse(format!(
                "output '{}' shadows the target field",
                self.target
            )));
        }
        Ok(())
    }
}

/// Evaluator over a validated [`RegressionDefinition`].
#[derive(Debug, Clone)]
pub struct RegressionModel {
    definition: RegressionDefinition,
}

impl RegressionModel {
    pub fn new(definition: RegressionDefinition) -> Result<Self> {
        definition.validate()?;
        Ok(Self { definition })
    }

    fn input(&self, field: &str) -> Result<&InputField> {
        self.definition
            .inputs
            .iter()
            .find(|f| f.name == field)
            .ok_or_else(|| VerdictError::validation(field, "not an input of this model"))
    }
}

impl Evaluator for RegressionModel {
    fn required_fields(&self) -> Vec<String> {
        self.definition.inputs.iter().map(|f| f.name.clone()).collect()
    }

    fn predicted_fields(&self) -> Vec<String> {
        vec![self.definition.target.clone()]
    }

    fn output_fields(&self) -> Vec<String> {
        self.definition.outputs.clone()
    }

    fn prepare(&self, field: &str, raw: Option<&Value>) -> Result<Value> {
        let input = self.input(field)?;

        let raw = match raw {
            None | Some(Value::Null) if input.optional => return Ok(Value::Null),
            None | Some(Value::Null) => {
                return Err(VerdictError::validation(field, "missing required value"))
            }
            Some(v) => v,
        };

        match input.field_type {
            FieldType::Numeric => {
                let number = match raw {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                number
                    .filter(|n| n.is_finite())
                    .map(Value::from)
                    .ok_or_else(|| VerdictError::validation(field, format!("expected a number, got {}", raw)))
            }
            FieldType::Categorical => {
                let category = match raw {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    other => {
                        return Err(VerdictError::validation(
                            field,
                            format!("expected a category, got {}", other),
                        ))
                    }
                };
                if !input.values.is_empty() && !input.values.contains(&category) {
                    return Err(VerdictError::validation(
                        field,
                        format!("'{}' is not one of {:?}", category, input.values),
                    ));
                }
                Ok(Value::String(category))
            }
        }
    }

    fn evaluate(&self, inputs: &HashMap<String, Value>) -> Result<Fields> {
        let def = &self.definition;
        let mut linear = def.intercept;

        // Declaration order keeps the floating-point sum reproducible.
        for input in &def.inputs {
            let name = &input.name;
            match input.field_type {
                FieldType::Numeric => {
                    let Some(coefficient) = def.numeric.get(name) else {
                        continue;
                    };
                    match inputs.get(name) {
                        Some(Value::Number(n)) => {
                            let x = n.as_f64().ok_or_else(|| {
                                VerdictError::Evaluation(format!(
                                    "input '{}' is not representable",
                                    name
                                ))
                            })?;
                            linear += coefficient * x;
                        }
                        Some(Value::Null) | None => {}
                        Some(other) => {
                            return Err(VerdictError::Evaluation(format!(
                                "input '{}' was not prepared as a number: {}",
                                name, other
                            )))
                        }
                    }
                }
                FieldType::Categorical => {
                    let levels = def.categorical.get(name);
                    if let (Some(levels), Some(Value::String(level))) = (levels, inputs.get(name)) {
                        linear += levels.get(level).copied().unwrap_or(0.0);
                    }
                }
            }
        }

        let predicted = def.link.apply(linear);
        if !predicted.is_finite() {
            return Err(VerdictError::Evaluation(format!(
                "prediction for '{}' is not finite",
                def.target
            )));
        }

        let mut out = Fields::new();
        out.insert(def.target.clone(), Value::from(predicted));
        for name in &def.outputs {
            out.insert(name.clone(), Value::from(predicted));
        }
        Ok(out)
    }
}

/// [`ModelParser`] for JSON regression documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegressionParser;

impl ModelParser for RegressionParser {
    fn parse(&self, definition: &[u8]) -> Result<ParsedModel> {
        let definition: RegressionDefinition = serde_json::from_slice(definition)?;
        let extensions = definition.extensions.clone();
        let model = RegressionModel::new(definition)?;
        Ok(ParsedModel {
            evaluator: Arc::new(model),
            extensions,
        })
    }
}
