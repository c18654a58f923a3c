use crate::AppState;
use axum::{response::Json, routing::get, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::saferpay::checkout,
        crate::handlers::saferpay::payment_return,
        crate::handlers::saferpay::notify,
        crate::handlers::health::health_check,
    ),
    components(schemas(
        crate::handlers::saferpay::CheckoutRequest,
        crate::handlers::saferpay::CheckoutResponse,
        crate::handlers::saferpay::ReturnStatus,
        crate::handlers::health::HealthStatus,
        crate::errors::ErrorResponse,
        crate::ApiResponse<crate::handlers::saferpay::CheckoutResponse>,
        crate::ApiResponse<crate::handlers::saferpay::ReturnStatus>,
    )),
    tags(
        (name = "Saferpay", description = "Payment page gateway endpoints"),
        (name = "Health", description = "Service health")
    ),
    info(
        title = "Saferpay Gateway API",
        description = "Off-site payment page gateway backed by the Saferpay JSON API"
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}
