use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-gateway scratch data stored in the order's `data` JSON column under
/// the gateway id key. Holds the payment-page token between initialization
/// and reconciliation, then the remote transaction id once known.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_number: String,
    pub total_amount: Decimal,
    pub currency: String,
    pub is_paid: bool,
    pub data: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Reads the scratch data stored for `gateway_id`, or the default when
    /// nothing was stored yet.
    pub fn gateway_data(&self, gateway_id: &str) -> GatewayData {
        self.data
            .get(gateway_id)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Returns the `data` column with `gateway_id` replaced by `data`.
    pub fn with_gateway_data(&self, gateway_id: &str, data: &GatewayData) -> Json {
        let mut bag = match &self.data {
            Json::Object(map) => Json::Object(map.clone()),
            _ => Json::Object(serde_json::Map::new()),
        };
        if let Json::Object(ref mut map) = bag {
            map.insert(
                gateway_id.to_string(),
                serde_json::to_value(data).unwrap_or(Json::Null),
            );
        }
        bag
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn order_with_data(data: Json) -> Model {
        Model {
            id: Uuid::new_v4(),
            order_number: "ORD-1001".to_string(),
            total_amount: dec!(19.99),
            currency: "CHF".to_string(),
            is_paid: false,
            data,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn gateway_data_defaults_when_absent() {
        let order = order_with_data(json!({}));
        assert_eq!(order.gateway_data("saferpay"), GatewayData::default());
    }

    #[test]
    fn with_gateway_data_preserves_other_keys() {
        let order = order_with_data(json!({"other_gateway": {"token": "keep"}}));
        let updated = order.with_gateway_data(
            "saferpay",
            &GatewayData {
                token: Some("tok-1".to_string()),
                transaction_id: None,
            },
        );

        assert_eq!(updated["saferpay"]["token"], "tok-1");
        assert_eq!(updated["other_gateway"]["token"], "keep");
    }
}
