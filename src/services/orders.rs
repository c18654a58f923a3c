//! Order lookup and the gateway-scoped persistence around it: session
//! tokens, remote transaction ids and the paid flag.

use crate::db::DbPool;
use crate::entities::order;
use crate::errors::ServiceError;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn find_order(&self, order_id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        let order = order::Entity::find_by_id(order_id).one(&*self.db).await?;
        Ok(order)
    }

    /// Stores the payment-page token for later reconciliation.
    #[instrument(skip(self, order, token), fields(order_id = %order.id))]
    pub async fn store_session_token(
        &self,
        order: &order::Model,
        gateway_id: &str,
        token: &str,
    ) -> Result<order::Model, ServiceError> {
        let mut data = order.gateway_data(gateway_id);
        data.token = Some(token.to_string());
        self.update_gateway_data(order, gateway_id, &data).await
    }

    /// Stores the provider transaction id as soon as it is known, so a later
    /// operator investigation can find the transaction even when the rest of
    /// reconciliation fails.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn store_transaction_id(
        &self,
        order: &order::Model,
        gateway_id: &str,
        transaction_id: &str,
    ) -> Result<order::Model, ServiceError> {
        let mut data = order.gateway_data(gateway_id);
        data.transaction_id = Some(transaction_id.to_string());
        self.update_gateway_data(order, gateway_id, &data).await
    }

    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn mark_paid(&self, order: &order::Model) -> Result<order::Model, ServiceError> {
        let active = order::ActiveModel {
            id: Set(order.id),
            is_paid: Set(true),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        let updated = active.update(&*self.db).await?;
        info!(order_id = %updated.id, "Order marked as paid");
        Ok(updated)
    }

    async fn update_gateway_data(
        &self,
        order: &order::Model,
        gateway_id: &str,
        data: &order::GatewayData,
    ) -> Result<order::Model, ServiceError> {
        let active = order::ActiveModel {
            id: Set(order.id),
            data: Set(order.with_gateway_data(gateway_id, data)),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        let updated = active.update(&*self.db).await?;
        Ok(updated)
    }
}
