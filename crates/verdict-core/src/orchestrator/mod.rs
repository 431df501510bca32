//! Evaluation dispatch across model versions.
//!
//! A request is scored against every targeted version independently. A
//! version that fails to prepare its inputs or to evaluate is reported as an
//! error marker under its own version key; sibling versions and later
//! requests of the same batch still run.

use crate::error::{Result, VerdictError};
use crate::registry::ModelRegistry;
use crate::types::{
    ErrorKind, EvaluationRequest, ModelRecord, ThresholdEvaluation, Version, VersionError,
    VersionOutcome, VersionedEvaluationResponse, SCORE_FIELD,
};
use rayon::prelude::*;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

type Target = (Version, Arc<ModelRecord>);

pub struct Orchestrator {
    registry: Arc<ModelRegistry>,
}

impl Orchestrator {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Score one request against `version`, or every live version of `name`
    /// when `version` is `None`.
    pub fn evaluate_one(
        &self,
        name: &str,
        version: Option<Version>,
        request: &EvaluationRequest,
    ) -> Result<VersionedEvaluationResponse> {
        let mut responses = self.evaluate_batch(name, version, std::slice::from_ref(request))?;
        Ok(responses
            .pop()
            .unwrap_or_else(|| VersionedEvaluationResponse::new(name)))
    }

    /// Score each request against the targeted versions.
    ///
    /// Output order follows `requests`. A missing explicit `version` fails
    /// the whole call with a not-found error; a name without versions yields
    /// one empty response per request.
    pub fn evaluate_batch(
        &self,
        name: &str,
        version: Option<Version>,
        requests: &[EvaluationRequest],
    ) -> Result<Vec<VersionedEvaluationResponse>> {
        // Records are cloned out of the registry here; no registry lock is
        // held while evaluators run.
        let targets = self.resolve_targets(name, version)?;
        log::debug!(
            "Evaluating {} request(s) against {} version(s) of {}",
            requests.len(),
            targets.len(),
            name
        );

        Ok(requests
            .iter()
            .map(|request| fan_out(name, &targets, request))
            .collect())
    }

    fn resolve_targets(&self, name: &str, version: Option<Version>) -> Result<Vec<Target>> {
        match version {
            Some(v) => Ok(vec![(v, self.registry.get(name, v)?)]),
            None => self.registry.get_all(name),
        }
    }
}

fn fan_out(name: &str, targets: &[Target], request: &EvaluationRequest) -> VersionedEvaluationResponse {
    let request_id = request.id.as_deref().unwrap_or("-");
    let parameters = normalize_parameters(&request.parameters);
    log::debug!(
        "Evaluating {} with parameters {:?} (request {})",
        name,
        parameters,
        request_id
    );

    let result: BTreeMap<Version, VersionOutcome> = targets
        .par_iter()
        .map(|(version, record)| {
            let outcome = match score(record, &parameters) {
                Ok(eval) => VersionOutcome::Scored(eval),
                Err(e) => {
                    log::warn!(
                        "Evaluation of {}@{} failed (request {}): {}",
                        name,
                        version,
                        request_id,
                        e
                    );
                    VersionOutcome::Failed {
                        error: version_error(e),
                    }
                }
            };
            (*version, outcome)
        })
        .collect();

    log::info!(
        "Evaluated {} across {} version(s) (request {})",
        name,
        result.len(),
        request_id
    );

    VersionedEvaluationResponse {
        model_name: name.to_string(),
        result,
    }
}

/// Replace boolean values with their `"true"` / `"false"` spelling.
///
/// Evaluators commonly encode boolean inputs as categorical strings; every
/// other value passes through unchanged.
pub fn normalize_parameters(parameters: &HashMap<String, Value>) -> HashMap<String, Value> {
    parameters
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::Bool(b) => Value::String(b.to_string()),
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Prepare inputs, evaluate and apply the threshold policy for one version.
fn score(record: &ModelRecord, parameters: &HashMap<String, Value>) -> Result<ThresholdEvaluation> {
    let evaluator = &record.evaluator;

    let mut inputs = HashMap::new();
    for field in evaluator.required_fields() {
        let prepared = evaluator.prepare(&field, parameters.get(&field))?;
        inputs.insert(field, prepared);
    }

    let mut result = evaluator.evaluate(&inputs)?;

    let score = record
        .threshold
        .as_ref()
        .and_then(|t| t.score_field.as_ref())
        .and_then(|field| result.get(field).cloned());

    let decision = match (&record.threshold, score.as_ref().and_then(Value::as_f64)) {
        (Some(policy), Some(s)) => policy.decide(s),
        _ => None,
    };

    if let Some(score) = score {
        result.insert(SCORE_FIELD.to_string(), score);
    }

    Ok(ThresholdEvaluation {
        result,
        threshold: record.threshold.clone(),
        decision,
    })
}

fn version_error(err: VerdictError) -> VersionError {
    let kind = match err {
        VerdictError::Validation { .. } => ErrorKind::Validation,
        VerdictError::Evaluation(_) => ErrorKind::Evaluation,
        _ => ErrorKind::Internal,
    };
    VersionError {
        kind,
        message: err.to_string(),
    }
}
