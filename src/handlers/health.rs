use crate::handlers::AppState;
use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub database: String,
    pub redis: String,
}

/// Liveness and dependency health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health", body = HealthStatus)
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let database = match crate::db::check_connection(&state.db).await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    };

    let redis = match &state.redis {
        Some(client) => match ping_redis(client).await {
            Ok(()) => "ok".to_string(),
            Err(e) => format!("error: {}", e),
        },
        None => "disabled".to_string(),
    };

    let status = if database == "ok" && !redis.starts_with("error") {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        database,
        redis,
    })
}

async fn ping_redis(client: &Arc<redis::Client>) -> Result<(), redis::RedisError> {
    let mut conn = client.get_async_connection().await?;
    redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
    Ok(())
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
