use crate::evaluator::Evaluator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Model version number. Positive, strictly increasing per model name.
pub type Version = u32;

/// Decoded evaluator output keyed by field name.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Name of the synthetic field mirroring a model's score output.
pub const SCORE_FIELD: &str = "score";

/// One `(name, value)` metadata extension declared by a model definition.
/// Order matters: later duplicates override earlier ones.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Extension {
    pub name: String,
    pub value: String,
}

impl Extension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Decision threshold declared in model metadata.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ThresholdPolicy {
    #[serde(rename = "trueIfAbove", skip_serializing_if = "Option::is_none", default)]
    pub lower_bound: Option<f32>,
    #[serde(rename = "trueIfBelow", skip_serializing_if = "Option::is_none", default)]
    pub upper_bound: Option<f32>,
    #[serde(skip)]
    pub score_field: Option<String>,
}

impl ThresholdPolicy {
    /// Pass/fail verdict for a score. `None` when no bound is declared.
    pub fn decide(&self, score: f64) -> Option<bool> {
        if self.lower_bound.is_none() && self.upper_bound.is_none() {
            return None;
        }
        let above = self.lower_bound.map_or(true, |lo| score > f64::from(lo));
        let below = self.upper_bound.map_or(true, |hi| score < f64::from(hi));
        Some(above && below)
    }
}

/// A deployed model version. Immutable once stored in the registry.
pub struct ModelRecord {
    pub evaluator: Arc<dyn Evaluator>,
    pub threshold: Option<ThresholdPolicy>,
    pub deployed_at: DateTime<Utc>,
}

impl ModelRecord {
    pub fn new(evaluator: Arc<dyn Evaluator>, threshold: Option<ThresholdPolicy>) -> Self {
        Self {
            evaluator,
            threshold,
            deployed_at: Utc::now(),
        }
    }

    /// Field listing plus threshold, as reported by model summaries.
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            active_fields: self.evaluator.required_fields(),
            predicted_fields: self.evaluator.predicted_fields(),
            output_fields: self.evaluator.output_fields(),
            threshold: self.threshold.clone(),
            deployed_at: self.deployed_at,
        }
    }
}

impl fmt::Debug for ModelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRecord")
            .field("required_fields", &self.evaluator.required_fields())
            .field("threshold", &self.threshold)
            .field("deployed_at", &self.deployed_at)
            .finish()
    }
}

/// Scoring request: named input values plus an optional correlation id.
///
/// The id is only ever logged; it never influences routing.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct EvaluationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

impl EvaluationRequest {
    pub fn new(parameters: HashMap<String, serde_json::Value>) -> Self {
        Self {
            id: None,
            parameters,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder helper for a single parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }
}

/// Successful evaluation of one request against one model version.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ThresholdEvaluation {
    pub result: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdPolicy>,
    /// Verdict derived from `score` and the threshold bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<bool>,
}

/// Failure category recorded for a single version in a fan-out.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Evaluation,
    Internal,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VersionError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Per-version entry of a versioned response: a result or an error marker.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(untagged)]
pub enum VersionOutcome {
    Failed { error: VersionError },
    Scored(ThresholdEvaluation),
}

impl VersionOutcome {
    pub fn scored(&self) -> Option<&ThresholdEvaluation> {
        match self {
            Self::Scored(eval) => Some(eval),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&VersionError> {
        match self {
            Self::Failed { error } => Some(error),
            Self::Scored(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Results of one request across every targeted version of a model.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VersionedEvaluationResponse {
    pub model_name: String,
    pub result: BTreeMap<Version, VersionOutcome>,
}

impl VersionedEvaluationResponse {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            result: BTreeMap::new(),
        }
    }
}

/// Field listing and threshold of a single deployed version.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub active_fields: Vec<String>,
    pub predicted_fields: Vec<String>,
    pub output_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdPolicy>,
    pub deployed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VersionedSummary {
    pub model_name: String,
    #[serde(rename = "summaryResponses")]
    pub versions: BTreeMap<Version, ModelSummary>,
}

/// Registry size counters for health reporting.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub model_count: usize,
    pub version_count: usize,
}
