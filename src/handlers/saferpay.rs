//! HTTP surface of the payment gateway: checkout initialization, the
//! payer's browser return and the server-to-server notification.

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::lock::reconcile_lock_name;
use crate::saferpay::types::ReturnUrls;
use crate::services::reconcile::ReconcileOutcome;
use crate::services::GATEWAY_ID;
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    /// Where the payment page sends the payer after a successful payment
    #[validate(url)]
    pub success_url: String,
    /// Where the payment page sends the payer after a failed payment
    #[validate(url)]
    pub fail_url: String,
    /// Where the payment page sends the payer after cancelling
    #[validate(url)]
    pub abort_url: String,
    /// Payment page language, ignored when unsupported
    pub language: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    /// Session token, also stored on the order for reconciliation
    pub token: String,
    /// Session expiry reported by the provider (ISO 8601)
    pub expiration: String,
    /// Where to send the payer's browser
    pub redirect_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnStatus {
    pub order_id: Uuid,
    pub paid: bool,
    /// Local payment state when a payment exists
    pub payment_state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub order: Option<String>,
}

/// Initialize a payment page session for an order
#[utoipa::path(
    post,
    path = "/api/v1/saferpay/checkout/{order_id}",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Session created", body = crate::ApiResponse<CheckoutResponse>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already paid", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider failure", body = crate::errors::ErrorResponse)
    ),
    tag = "Saferpay"
)]
pub async fn checkout(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<ApiResponse<CheckoutResponse>>, ServiceError> {
    request.validate()?;

    let order = state
        .orders()
        .find_order(order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

    let session = state
        .session_initializer()
        .initialize(
            &order,
            ReturnUrls {
                success: request.success_url,
                fail: request.fail_url,
                abort: request.abort_url,
            },
            request.language.as_deref(),
        )
        .await?;

    // The token belongs on the order; reconciliation reads it back later.
    state
        .orders()
        .store_session_token(&order, GATEWAY_ID, &session.token)
        .await?;

    Ok(Json(ApiResponse::success(CheckoutResponse {
        token: session.token,
        expiration: session.expiration,
        redirect_url: session.redirect_url,
    })))
}

/// Payer browser return from the payment page
///
/// Reconciliation belongs to the provider notification. This entry only
/// waits a bounded time for an in-flight reconciliation to finish and then
/// reports the persisted outcome.
#[utoipa::path(
    get,
    path = "/api/v1/saferpay/return",
    params(("order" = String, Query, description = "Order id")),
    responses(
        (status = 200, description = "Payment status", body = crate::ApiResponse<ReturnStatus>),
        (status = 202, description = "Payment still processing", body = crate::ApiResponse<ReturnStatus>),
        (status = 400, description = "Bad request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Saferpay"
)]
pub async fn payment_return(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> Result<Response, ServiceError> {
    let order_id = parse_order_id(query.order.as_deref())
        .map_err(|msg| ServiceError::InvalidInput(msg.to_string()))?;

    let order = state
        .orders()
        .find_order(order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

    // The notification owns the lock while it reconciles; wait it out.
    let lock_name = reconcile_lock_name(order.id);
    let wait = Duration::from_secs(state.config.return_wait_secs);
    if !state.lock.wait_until_available(&lock_name, wait).await? {
        info!(order_id = %order.id, "Reconciliation still running after bounded wait");
        return Ok((
            StatusCode::ACCEPTED,
            Json(ApiResponse::<ReturnStatus>::error(
                "Payment still processing.".to_string(),
            )),
        )
            .into_response());
    }

    status_from_storage(&state, order.id).await
}

/// Reports the persisted outcome without touching the provider.
async fn status_from_storage(state: &AppState, order_id: Uuid) -> Result<Response, ServiceError> {
    let payment = state.reconciler().existing_payment(order_id).await?;
    match payment {
        Some(payment) => Ok(Json(ApiResponse::success(ReturnStatus {
            order_id,
            paid: true,
            payment_state: Some(payment.state),
        }))
        .into_response()),
        None => Ok(Json(ApiResponse::<ReturnStatus>::error(
            "Payment was not completed.".to_string(),
        ))
        .into_response()),
    }
}

/// Server-to-server notification from Saferpay
///
/// The provider only checks the HTTP status, so responses are short plain
/// text. A held lock answers OK (someone else is already reconciling);
/// every reconciliation rejection, replays included, answers 400.
#[utoipa::path(
    get,
    path = "/api/v1/saferpay/notify",
    params(("order" = String, Query, description = "Order id")),
    responses(
        (status = 200, description = "Notification accepted"),
        (status = 400, description = "Missing or invalid order parameter, or reconciliation rejected"),
        (status = 500, description = "Infrastructure failure")
    ),
    tag = "Saferpay"
)]
pub async fn notify(State(state): State<AppState>, Query(query): Query<OrderQuery>) -> Response {
    let order_id = match parse_order_id(query.order.as_deref()) {
        Ok(order_id) => order_id,
        Err(body) => return (StatusCode::BAD_REQUEST, body).into_response(),
    };

    let order = match state.orders().find_order(order_id).await {
        Ok(Some(order)) => order,
        Ok(None) => return (StatusCode::BAD_REQUEST, "Invalid order id.").into_response(),
        Err(e) => {
            error!(order_id = %order_id, error = %e, "Order lookup failed during notification");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error while processing payment.",
            )
                .into_response();
        }
    };

    let lock_name = reconcile_lock_name(order.id);
    match state.lock.try_acquire(&lock_name).await {
        Ok(true) => {}
        // Another reconciliation is in flight; this notification is a
        // duplicate and needs no further work.
        Ok(false) => {
            info!(order_id = %order.id, "Duplicate notification, reconciliation already running");
            return (StatusCode::OK, "OK").into_response();
        }
        Err(e) => {
            error!(order_id = %order.id, error = %e, "Lock acquisition failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error while processing payment.",
            )
                .into_response();
        }
    }

    let result = state.reconciler().reconcile(&order).await;
    if let Err(e) = state.lock.release(&lock_name).await {
        error!(order_id = %order.id, error = %e, "Lock release failed");
    }

    match result {
        Ok(ReconcileOutcome::Persisted(_)) => (StatusCode::OK, "OK").into_response(),
        Ok(ReconcileOutcome::Rejected(reason)) => {
            warn!(order_id = %order.id, ?reason, "Notification reconciliation rejected");
            (
                StatusCode::BAD_REQUEST,
                "Error while processing payment.",
            )
                .into_response()
        }
        // An order without a usable session is a bad request; transport and
        // storage failures stay 500 so the provider retries later.
        Err(e @ (ServiceError::InvalidInput(_) | ServiceError::ValidationError(_))) => {
            warn!(order_id = %order.id, error = %e, "Notification rejected");
            (
                StatusCode::BAD_REQUEST,
                "Error while processing payment.",
            )
                .into_response()
        }
        Err(e) => {
            error!(order_id = %order.id, error = %e, "Notification reconciliation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error while processing payment.",
            )
                .into_response()
        }
    }
}

fn parse_order_id(raw: Option<&str>) -> Result<Uuid, &'static str> {
    let raw = raw.ok_or("Missing order query parameter.")?;
    Uuid::parse_str(raw).map_err(|_| "Invalid order id.")
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/saferpay/checkout/:order_id", post(checkout))
        .route("/saferpay/return", get(payment_return))
        .route("/saferpay/notify", get(notify).post(notify))
}
