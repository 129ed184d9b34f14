use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use uuid::Uuid;

use crate::entities::order::OrderStatus;

/// Error taxonomy for the service layer.
///
/// Every mutating operation either fully succeeds or leaves durable state
/// exactly as it was; `DatabaseError` from an atomic stock+ledger write means
/// the operation never happened and callers may retry it whole.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Invalid status transition from '{from}' to '{to}'")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Event error: {0}")]
    EventError(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::ValidationError(msg.into())
    }

    pub fn insufficient_stock(product_id: Uuid, requested: i32, available: i32) -> Self {
        ServiceError::InsufficientStock {
            product_id,
            requested,
            available,
        }
    }

    pub fn non_positive_price(price: Decimal) -> Self {
        ServiceError::ValidationError(format!("price must be positive, got {price}"))
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_names_product_and_quantities() {
        let product_id = Uuid::new_v4();
        let err = ServiceError::insufficient_stock(product_id, 3, 2);
        let msg = err.to_string();
        assert!(msg.contains(&product_id.to_string()));
        assert!(msg.contains("requested 3"));
        assert!(msg.contains("available 2"));
    }

    #[test]
    fn invalid_transition_names_both_statuses() {
        let err = ServiceError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition from 'delivered' to 'cancelled'"
        );
    }
}
