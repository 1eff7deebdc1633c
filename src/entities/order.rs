use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-facing sequence identifier, `#NNNN`. Unique at the storage
    /// boundary; the allocating counter itself is race-prone.
    #[sea_orm(unique)]
    pub order_number: String,

    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub note: Option<String>,

    pub payment_method: String,
    pub payment_status: String,
    pub order_status: String,

    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,

    pub preference_id: Option<String>,
    pub payment_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Payment state reported by the gateway, persisted as text.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

/// Fulfillment state. Any value may replace any other: there is no transition
/// graph on purpose.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn statuses_round_trip_through_storage_strings() {
        assert_eq!(PaymentStatus::Approved.to_string(), "approved");
        assert_eq!(
            PaymentStatus::from_str("rejected").unwrap(),
            PaymentStatus::Rejected
        );
        assert_eq!(OrderStatus::Confirmed.to_string(), "confirmed");
        assert_eq!(
            OrderStatus::from_str("delivered").unwrap(),
            OrderStatus::Delivered
        );
        assert!(OrderStatus::from_str("refunded").is_err());
    }
}
