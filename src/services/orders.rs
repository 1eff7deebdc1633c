use crate::{
    config::AppConfig,
    entities::order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel,
        OrderStatus, PaymentStatus,
    },
    entities::order_item::{
        self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity,
        Model as OrderItemModel,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// One line item of a checkout submission.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInput {
    #[validate(length(min = 1, message = "Item name is required"))]
    pub name: String,
    #[validate(custom = "validate_unit_price")]
    pub unit_price: Decimal,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
}

fn validate_unit_price(unit_price: &Decimal) -> Result<(), ValidationError> {
    if unit_price.is_sign_negative() {
        return Err(ValidationError::new("unit_price_negative"));
    }
    Ok(())
}

/// Checkout submission payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(email(message = "Customer email must be a valid address"))]
    pub customer_email: String,
    #[validate(length(min = 1, message = "Customer phone is required"))]
    pub customer_phone: String,
    #[validate(length(min = 1, message = "Delivery address is required"))]
    pub delivery_address: String,
    pub note: Option<String>,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
    pub items: Vec<OrderItemInput>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub note: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    pub payment_method: String,
    pub payment_status: String,
    pub order_status: String,
    pub preference_id: Option<String>,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Computes subtotal, shipping and total for a list of items. Totals are
/// computed once at creation and never recomputed afterwards.
pub fn compute_totals(
    items: &[OrderItemInput],
    free_shipping_threshold: Decimal,
    shipping_fee: Decimal,
) -> (Decimal, Decimal, Decimal) {
    let subtotal: Decimal = items
        .iter()
        .map(|item| item.unit_price * Decimal::from(item.quantity))
        .sum();
    let shipping = if subtotal >= free_shipping_threshold {
        Decimal::ZERO
    } else {
        shipping_fee
    };
    (subtotal, shipping, subtotal + shipping)
}

/// Formats the human-facing order identifier: `#` plus the sequence number
/// zero-padded to at least four digits.
pub fn format_order_number(sequence: u64) -> String {
    format!("#{:04}", sequence)
}

/// Service for order pricing, identity allocation and lifecycle state.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    free_shipping_threshold: Decimal,
    shipping_fee: Decimal,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, config: &AppConfig) -> Self {
        Self {
            db,
            free_shipping_threshold: Decimal::from(config.free_shipping_threshold),
            shipping_fee: Decimal::from(config.shipping_fee),
        }
    }

    /// Allocates the next `#NNNN` identifier from the current order count.
    ///
    /// Race-prone: two concurrent creators can read the same count. The unique
    /// index on `order_number` turns the duplicate into a write failure.
    async fn next_order_number(&self) -> Result<String, ServiceError> {
        let count = OrderEntity::find()
            .count(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(format_order_number(count + 1))
    }

    /// Creates a new order from a checkout submission.
    #[instrument(skip(self, request), fields(customer_email = %request.customer_email))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one item is required".to_string(),
            ));
        }
        for item in &request.items {
            item.validate()
                .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        }

        let (subtotal, shipping, total) =
            compute_totals(&request.items, self.free_shipping_threshold, self.shipping_fee);
        let order_number = self.next_order_number().await?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order_active_model = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            customer_name: Set(request.customer_name.clone()),
            customer_email: Set(request.customer_email.clone()),
            customer_phone: Set(request.customer_phone.clone()),
            delivery_address: Set(request.delivery_address.clone()),
            note: Set(request.note.clone()),
            payment_method: Set(request.payment_method.clone()),
            payment_status: Set(PaymentStatus::Pending.to_string()),
            order_status: Set(OrderStatus::Pending.to_string()),
            subtotal: Set(subtotal),
            shipping: Set(shipping),
            total: Set(total),
            preference_id: Set(None),
            payment_id: Set(None),
            created_at: Set(now),
        };

        let order_model = order_active_model.insert(&txn).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                warn!(order_number = %order_number, "Concurrent creation allocated a duplicate order number");
                ServiceError::Conflict(format!(
                    "order number {} was allocated concurrently; retry the submission",
                    order_number
                ))
            } else {
                error!(error = %e, order_id = %order_id, "Failed to create order in database");
                ServiceError::DatabaseError(e)
            }
        })?;

        let mut item_models = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let item_model = OrderItemActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                name: Set(item.name.clone()),
                unit_price: Set(item.unit_price),
                quantity: Set(item.quantity as i32),
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to insert order item");
                ServiceError::DatabaseError(e)
            })?;
            item_models.push(item_model);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, order_number = %order_model.order_number, "Order created successfully");

        Ok(Self::to_response(order_model, item_models))
    }

    /// Retrieves an order by ID
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        match order {
            Some(order_model) => {
                let items = self.items_for(order_model.id).await?;
                Ok(Some(Self::to_response(order_model, items)))
            }
            None => Ok(None),
        }
    }

    /// Retrieves an order by its human-facing identifier (webhook correlation)
    #[instrument(skip(self))]
    pub async fn get_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderResponse>, ServiceError> {
        let order = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        match order {
            Some(order_model) => {
                let items = self.items_for(order_model.id).await?;
                Ok(Some(Self::to_response(order_model, items)))
            }
            None => Ok(None),
        }
    }

    /// Lists all orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = OrderEntity::find()
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut items_by_order: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
        for item in items {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                Self::to_response(order, items)
            })
            .collect())
    }

    /// Admin status override. Deliberately validates nothing about the
    /// transition: any status can replace any other at any time.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %status))]
    pub async fn set_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: OrderActiveModel = order.into();
        active.order_status = Set(status.to_string());
        let updated = active
            .update(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        info!(order_id = %order_id, "Order status updated");

        let items = self.items_for(updated.id).await?;
        Ok(Self::to_response(updated, items))
    }

    /// Persists the gateway checkout-session id on the order. Called before
    /// the checkout response is returned to the client.
    #[instrument(skip(self))]
    pub async fn set_preference_id(
        &self,
        order_id: Uuid,
        preference_id: &str,
    ) -> Result<(), ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: OrderActiveModel = order.into();
        active.preference_id = Set(Some(preference_id.to_string()));
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    /// Applies a reconciled payment result: payment status always, order
    /// status only when the reconciler derived a new one.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn apply_payment_result(
        &self,
        order_id: Uuid,
        payment_id: &str,
        payment_status: PaymentStatus,
        order_status: Option<OrderStatus>,
    ) -> Result<OrderResponse, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: OrderActiveModel = order.into();
        active.payment_id = Set(Some(payment_id.to_string()));
        active.payment_status = Set(payment_status.to_string());
        if let Some(status) = order_status {
            active.order_status = Set(status.to_string());
        }

        let updated = active
            .update(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let items = self.items_for(updated.id).await?;
        Ok(Self::to_response(updated, items))
    }

    async fn items_for(&self, order_id: Uuid) -> Result<Vec<OrderItemModel>, ServiceError> {
        OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    fn to_response(order: OrderModel, items: Vec<OrderItemModel>) -> OrderResponse {
        OrderResponse {
            id: order.id,
            order_number: order.order_number,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            customer_phone: order.customer_phone,
            delivery_address: order.delivery_address,
            note: order.note,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    name: item.name,
                    unit_price: item.unit_price,
                    quantity: item.quantity as u32,
                })
                .collect(),
            subtotal: order.subtotal,
            shipping: order.shipping,
            total: order.total,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            order_status: order.order_status,
            preference_id: order.preference_id,
            payment_id: order.payment_id,
            created_at: order.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(unit_price: Decimal, quantity: u32) -> OrderItemInput {
        OrderItemInput {
            name: "Ramo de 12 rosas".to_string(),
            unit_price,
            quantity,
        }
    }

    #[test]
    fn totals_add_flat_fee_below_threshold() {
        let (subtotal, shipping, total) =
            compute_totals(&[item(dec!(500), 2)], dec!(2000), dec!(150));
        assert_eq!(subtotal, dec!(1000));
        assert_eq!(shipping, dec!(150));
        assert_eq!(total, dec!(1150));
    }

    #[test]
    fn totals_ship_free_at_threshold() {
        let (subtotal, shipping, total) =
            compute_totals(&[item(dec!(1000), 2)], dec!(2000), dec!(150));
        assert_eq!(subtotal, dec!(2000));
        assert_eq!(shipping, Decimal::ZERO);
        assert_eq!(total, dec!(2000));
    }

    #[rstest::rstest]
    #[case(dec!(1), 1)]
    #[case(dec!(950), 1)]
    #[case(dec!(1800), 3)]
    #[case(dec!(1999), 1)]
    #[case(dec!(0), 5)]
    fn total_is_always_subtotal_plus_shipping(#[case] price: Decimal, #[case] qty: u32) {
        let (subtotal, shipping, total) = compute_totals(&[item(price, qty)], dec!(2000), dec!(150));
        assert_eq!(total, subtotal + shipping);
        assert_eq!(shipping == Decimal::ZERO, subtotal >= dec!(2000));
    }

    #[test]
    fn empty_item_list_still_pays_shipping() {
        let (subtotal, shipping, total) = compute_totals(&[], dec!(2000), dec!(150));
        assert_eq!(subtotal, Decimal::ZERO);
        assert_eq!(shipping, dec!(150));
        assert_eq!(total, dec!(150));
    }

    #[test]
    fn order_numbers_are_zero_padded_to_four_digits() {
        assert_eq!(format_order_number(1), "#0001");
        assert_eq!(format_order_number(42), "#0042");
        assert_eq!(format_order_number(9999), "#9999");
        assert_eq!(format_order_number(12345), "#12345");
    }

    #[test]
    fn item_validation_rejects_bad_values() {
        assert!(item(dec!(-10), 1).validate().is_err());
        assert!(item(dec!(10), 0).validate().is_err());
        assert!(item(dec!(10), 1).validate().is_ok());
    }
}
