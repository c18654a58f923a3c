//! Reconciliation orchestrator: verifies the transaction with Saferpay,
//! optionally captures it, and persists the resulting payment exactly once
//! per order. Callers must hold the order's reconciliation lock.

use crate::db::DbPool;
use crate::entities::{order, payment};
use crate::errors::ServiceError;
use crate::hooks::AssertHooks;
use crate::saferpay::types::{
    AssertRequest, AssertResponse, CaptureRequest, CaptureResponse, TransactionReference,
    TRANSACTION_AUTHORIZED, TRANSACTION_CAPTURED,
};
use crate::saferpay::{SaferpayClient, ASSERT_PATH, CAPTURE_PATH};
use crate::services::orders::OrderService;
use crate::services::GATEWAY_ID;
use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Why reconciliation declined to persist a payment. None of these are
/// transport or storage failures; those surface as errors instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// A payment for this order already exists, a replayed notification.
    AlreadyProcessed,
    /// The asserted transaction was not in AUTHORIZED state.
    NotAuthorized { status: String },
    /// The capture call succeeded but reported an unexpected status.
    CaptureFailed { status: String },
}

#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// The payment was verified and persisted; the order is now paid.
    Persisted(payment::Model),
    Rejected(RejectReason),
}

pub struct ReconcileService {
    db: Arc<DbPool>,
    client: Arc<SaferpayClient>,
    orders: OrderService,
    hooks: Arc<AssertHooks>,
}

impl ReconcileService {
    pub fn new(
        db: Arc<DbPool>,
        client: Arc<SaferpayClient>,
        orders: OrderService,
        hooks: Arc<AssertHooks>,
    ) -> Self {
        Self {
            db,
            client,
            orders,
            hooks,
        }
    }

    /// Looks up the payment a previous reconciliation persisted, if any.
    pub async fn existing_payment(
        &self,
        order_id: Uuid,
    ) -> Result<Option<payment::Model>, ServiceError> {
        let existing = payment::Entity::find()
            .filter(payment::Column::PaymentGateway.eq(GATEWAY_ID))
            .filter(payment::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?;
        Ok(existing)
    }

    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn reconcile(&self, order: &order::Model) -> Result<ReconcileOutcome, ServiceError> {
        if self.existing_payment(order.id).await?.is_some() {
            counter!("saferpay_reconcile.duplicate", 1);
            info!(order_id = %order.id, "Payment already recorded, skipping");
            return Ok(ReconcileOutcome::Rejected(RejectReason::AlreadyProcessed));
        }

        let token = order
            .gateway_data(GATEWAY_ID)
            .token
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "order {} has no payment page session token",
                    order.id
                ))
            })?;

        let request_id = order.id.to_string();
        let asserted: AssertResponse = self
            .client
            .post(ASSERT_PATH, &request_id, &AssertRequest { token })
            .await?;

        let transaction = &asserted.transaction;
        if self.client.config().debug {
            debug!(
                order_id = %order.id,
                transaction_id = %transaction.id,
                status = %transaction.status,
                "Assert response"
            );
        }
        // Persist the transaction id before the status check, so a rejected
        // or failed reconciliation still leaves a trail for operators.
        let order = self
            .orders
            .store_transaction_id(order, GATEWAY_ID, &transaction.id)
            .await?;

        if transaction.status != TRANSACTION_AUTHORIZED {
            counter!("saferpay_reconcile.not_authorized", 1);
            warn!(
                order_id = %order.id,
                status = %transaction.status,
                transaction_id = %transaction.id,
                "Asserted transaction is not authorized"
            );
            return Ok(ReconcileOutcome::Rejected(RejectReason::NotAuthorized {
                status: transaction.status.clone(),
            }));
        }

        let (state, remote_state) = if self.client.config().autocomplete {
            let captured: CaptureResponse = self
                .client
                .post(
                    CAPTURE_PATH,
                    &request_id,
                    &CaptureRequest {
                        transaction_reference: TransactionReference {
                            transaction_id: transaction.id.clone(),
                        },
                    },
                )
                .await?;

            if captured.status != TRANSACTION_CAPTURED {
                counter!("saferpay_reconcile.capture_failed", 1);
                warn!(
                    order_id = %order.id,
                    status = %captured.status,
                    "Capture reported an unexpected status"
                );
                return Ok(ReconcileOutcome::Rejected(RejectReason::CaptureFailed {
                    status: captured.status,
                }));
            }
            (payment::STATE_COMPLETED, captured.status)
        } else {
            (
                payment::STATE_AUTHORIZATION,
                TRANSACTION_AUTHORIZED.to_string(),
            )
        };

        let now = Utc::now();
        let mut pending = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            payment_gateway: Set(GATEWAY_ID.to_string()),
            state: Set(state.to_string()),
            amount: Set(order.total_amount),
            currency: Set(order.currency.clone()),
            remote_id: Set(transaction.id.clone()),
            remote_state: Set(remote_state),
            test: Set(self.client.config().is_test()),
            authorized_at: Set(now),
            created_at: Set(now),
        };

        self.hooks.notify(&asserted, &order, &mut pending).await;

        let persisted = pending.insert(&*self.db).await?;
        self.orders.mark_paid(&order).await?;

        counter!("saferpay_reconcile.persisted", 1);
        info!(
            order_id = %order.id,
            payment_id = %persisted.id,
            state = %persisted.state,
            remote_id = %persisted.remote_id,
            "Payment reconciled"
        );

        Ok(ReconcileOutcome::Persisted(persisted))
    }
}
