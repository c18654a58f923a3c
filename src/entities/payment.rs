use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment awaiting capture: the transaction is authorized at Saferpay but
/// the funds have not been collected yet.
pub const STATE_AUTHORIZATION: &str = "authorization";

/// Payment whose transaction has been captured.
pub const STATE_COMPLETED: &str = "completed";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub payment_gateway: String,
    pub state: String,
    pub amount: Decimal,
    pub currency: String,
    /// Transaction id assigned by the provider.
    pub remote_id: String,
    /// Transaction status as last reported by the provider.
    pub remote_state: String,
    /// Whether the payment went through the provider's test environment.
    pub test: bool,
    pub authorized_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {}
