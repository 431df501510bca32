use super::{AppResult, AppState, EvaluationTimeout, JsonResponse};
use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Json, Response},
    Json as AxumJson,
};
use verdict_core::{EvaluationRequest, ModelRegistry, Orchestrator, Version};

/// Run an evaluation on the blocking pool, bounded by the configured timeout.
///
/// Evaluators are synchronous and may be slow; the async worker threads are
/// never blocked on them.
async fn run_evaluation<T, F>(state: &AppState, f: F) -> AppResult<T>
where
    F: FnOnce(&Orchestrator) -> verdict_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let orchestrator = state.orchestrator.clone();
    let task = tokio::task::spawn_blocking(move || f(&orchestrator));

    match tokio::time::timeout(state.eval_timeout, task).await {
        Err(_) => Err(EvaluationTimeout(state.eval_timeout).into()),
        Ok(joined) => Ok(joined??),
    }
}

/// Parse and store an uploaded definition on the blocking pool.
///
/// Definitions can be large; parsing them never runs on an async worker.
async fn run_deploy<T, F>(state: &AppState, f: F) -> AppResult<T>
where
    F: FnOnce(&ModelRegistry) -> verdict_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let registry = state.registry.clone();
    let deployed = tokio::task::spawn_blocking(move || f(&registry)).await?;
    Ok(deployed?)
}

/// GET /model: names with at least one live version
pub async fn list_models(State(state): State<AppState>) -> AppResult<Response> {
    let names = state.registry.list_names()?;
    Ok(Json(JsonResponse::ok(names)).into_response())
}

/// GET /model/:name: field listing and threshold of every version
pub async fn get_summary(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Response> {
    let summary = state.registry.summary(&name)?;
    Ok(Json(JsonResponse::ok(summary)).into_response())
}

/// PUT /model/:name: deploy under the next free version
pub async fn deploy_next(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> AppResult<Response> {
    let bytes = body.len();
    let version = {
        let name = name.clone();
        run_deploy(&state, move |registry| registry.deploy_next(&name, &body)).await?
    };
    tracing::info!(model = %name, version, bytes, "model deployed");
    Ok(deployed(&name, version))
}

/// PUT /model/:name/:version: deploy under an explicit version
pub async fn deploy_at(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, Version)>,
    body: Bytes,
) -> AppResult<Response> {
    let bytes = body.len();
    {
        let name = name.clone();
        run_deploy(&state, move |registry| registry.deploy_at(&name, version, &body)).await?;
    }
    tracing::info!(model = %name, version, bytes, "model deployed");
    Ok(deployed(&name, version))
}

fn deployed(name: &str, version: Version) -> Response {
    Json(JsonResponse::ok(serde_json::json!({
        "model": name,
        "version": version,
        "message": format!("Model {} version {} deployed successfully", name, version),
    })))
    .into_response()
}

/// DELETE /model/:name/:version: undeploy a single version
pub async fn undeploy(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, Version)>,
) -> AppResult<Response> {
    state.registry.remove(&name, version)?;
    tracing::info!(model = %name, version, "model undeployed");
    Ok(Json(JsonResponse::ok(serde_json::json!({
        "model": name,
        "version": version,
        "message": format!("Model {} version {} undeployed successfully", name, version),
    })))
    .into_response())
}

/// POST /model/:name: evaluate against every live version
pub async fn evaluate(
    State(state): State<AppState>,
    Path(name): Path<String>,
    AxumJson(request): AxumJson<EvaluationRequest>,
) -> AppResult<Response> {
    let response =
        run_evaluation(&state, move |orch| orch.evaluate_one(&name, None, &request)).await?;
    Ok(Json(JsonResponse::ok(response)).into_response())
}

/// POST /model/:name/batch: evaluate many requests against every live version
pub async fn evaluate_batch(
    State(state): State<AppState>,
    Path(name): Path<String>,
    AxumJson(requests): AxumJson<Vec<EvaluationRequest>>,
) -> AppResult<Response> {
    let responses =
        run_evaluation(&state, move |orch| orch.evaluate_batch(&name, None, &requests)).await?;
    Ok(Json(JsonResponse::ok(responses)).into_response())
}

/// POST /model/:name/:version: evaluate against one version
pub async fn evaluate_version(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, Version)>,
    AxumJson(request): AxumJson<EvaluationRequest>,
) -> AppResult<Response> {
    let response = run_evaluation(&state, move |orch| {
        orch.evaluate_one(&name, Some(version), &request)
    })
    .await?;
    Ok(Json(JsonResponse::ok(response)).into_response())
}

/// POST /model/:name/:version/batch: evaluate many requests against one version
pub async fn evaluate_version_batch(
    State(state): State<AppState>,
    Path((name, version)): Path<(String, Version)>,
    AxumJson(requests): AxumJson<Vec<EvaluationRequest>>,
) -> AppResult<Response> {
    let responses = run_evaluation(&state, move |orch| {
        orch.evaluate_batch(&name, Some(version), &requests)
    })
    .await?;
    Ok(Json(JsonResponse::ok(responses)).into_response())
}
