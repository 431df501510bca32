use super::{models, AppResult, AppState, JsonResponse};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use verdict_core::RegistryStats;

pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.max_body_size;

    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/model", get(models::list_models))
        .route(
            "/model/:name",
            get(models::get_summary)
                .put(models::deploy_next)
                .post(models::evaluate),
        )
        .route("/model/:name/batch", post(models::evaluate_batch))
        .route(
            "/model/:name/:version",
            put(models::deploy_at)
                .post(models::evaluate_version)
                .delete(models::undeploy),
        )
        .route(
            "/model/:name/:version/batch",
            post(models::evaluate_version_batch),
        )
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
    version: String,
    uptime_seconds: u64,
    stats: RegistryStats,
}

async fn health(State(state): State<AppState>) -> AppResult<Json<JsonResponse<HealthResponse>>> {
    // An empty registry is still healthy; only an unreadable one is not.
    let stats = state.registry.stats()?;

    Ok(Json(JsonResponse::ok(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        stats,
    })))
}

async fn stats(State(state): State<AppState>) -> AppResult<Json<JsonResponse<RegistryStats>>> {
    Ok(Json(JsonResponse::ok(state.registry.stats()?)))
}
