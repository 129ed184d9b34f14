use crate::{
    db::DbPool,
    entities::inventory_transaction::TransactionKind,
    entities::order::{self, OrderStatus},
    entities::order_item,
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::{unwrap_transaction_error, CatalogService},
    services::orders::OrderDetails,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Ephemeral checkout input: product id -> requested quantity. Built and
/// cleared by the caller; never persisted.
pub type Cart = HashMap<Uuid, i32>;

/// Converts a cart into a durable order.
///
/// Each line's stock decrement is its own atomic stock+ledger transaction;
/// no lock spans the whole multi-product operation. Successful decrements go
/// onto a compensation list that is unwound (reverse order, as returns) if a
/// later line or the order-insert transaction fails, so a failed checkout
/// leaves stock exactly where it started.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    catalog: Arc<CatalogService>,
    event_sender: EventSender,
}

struct LineSnapshot {
    product_id: Uuid,
    quantity: i32,
    product_name: String,
    unit_price: Decimal,
}

impl CheckoutService {
    pub fn new(db: Arc<DbPool>, catalog: Arc<CatalogService>, event_sender: EventSender) -> Self {
        Self {
            db,
            catalog,
            event_sender,
        }
    }

    #[instrument(skip(self, cart), fields(customer_id = %customer_id, lines = cart.len()))]
    pub async fn place_order(
        &self,
        customer_id: Uuid,
        cart: &Cart,
    ) -> Result<OrderDetails, ServiceError> {
        if cart.is_empty() {
            return Err(ServiceError::validation(
                "cart must contain at least one line",
            ));
        }

        let mut lines: Vec<(Uuid, i32)> = cart.iter().map(|(p, q)| (*p, *q)).collect();
        for (product_id, quantity) in &lines {
            if *quantity <= 0 {
                return Err(ServiceError::validation(format!(
                    "quantity for product {} must be positive, got {}",
                    product_id, quantity
                )));
            }
        }

        // Deterministic processing order keeps multi-line checkouts from
        // interleaving pathologically under concurrency.
        lines.sort_by_key(|(product_id, _)| *product_id);

        // Resolve every product before moving any stock, so an unknown id
        // fails the whole cart without side effects.
        for (product_id, _) in &lines {
            self.catalog.get_product(*product_id).await?;
        }

        let mut decremented: Vec<(Uuid, i32)> = Vec::new();
        let mut snapshots: Vec<LineSnapshot> = Vec::new();
        for (product_id, quantity) in &lines {
            match self
                .catalog
                .adjust_stock(
                    *product_id,
                    -quantity,
                    TransactionKind::Sale,
                    Some(customer_id),
                )
                .await
            {
                Ok(product) => {
                    snapshots.push(LineSnapshot {
                        product_id: *product_id,
                        quantity: *quantity,
                        product_name: product.name,
                        unit_price: product.price,
                    });
                    decremented.push((*product_id, *quantity));
                }
                Err(err) => {
                    self.undo_decrements(&decremented).await;
                    return Err(err);
                }
            }
        }

        let total_amount: Decimal = snapshots
            .iter()
            .map(|line| Decimal::from(line.quantity) * line.unit_price)
            .sum();

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let result = self
            .db
            .transaction::<_, (order::Model, Vec<order_item::Model>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = order::ActiveModel {
                        id: Set(order_id),
                        customer_id: Set(customer_id),
                        status: Set(OrderStatus::Placed.as_str().to_string()),
                        total_amount: Set(total_amount),
                        created_at: Set(now),
                        updated_at: Set(Some(now)),
                        paid_at: Set(None),
                        delivered_at: Set(None),
                    }
                    .insert(txn)
                    .await?;

                    let mut items = Vec::with_capacity(snapshots.len());
                    for line in snapshots {
                        let item = order_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            order_id: Set(order_id),
                            product_id: Set(line.product_id),
                            product_name: Set(line.product_name),
                            quantity: Set(line.quantity),
                            unit_price: Set(line.unit_price),
                            created_at: Set(now),
                        }
                        .insert(txn)
                        .await?;
                        items.push(item);
                    }

                    Ok((order, items))
                })
            })
            .await;

        let (order, items) = match result {
            Ok(created) => created,
            Err(err) => {
                // The decrements committed but the order did not; undo them
                // before surfacing the error.
                self.undo_decrements(&decremented).await;
                return Err(unwrap_transaction_error(err));
            }
        };

        info!(
            order_id = %order.id,
            customer_id = %customer_id,
            total = %order.total_amount,
            items = items.len(),
            "order placed"
        );

        if let Err(e) = self.event_sender.send(Event::OrderCreated(order.id)).await {
            warn!(order_id = %order.id, error = %e, "failed to send order created event");
        }

        Ok(OrderDetails { order, items })
    }

    /// Unwinds committed decrements in reverse order as return adjustments.
    /// Failures here are logged and swallowed: the original error is the one
    /// the caller needs to see, and a retryable store will converge on the
    /// next attempt.
    async fn undo_decrements(&self, decremented: &[(Uuid, i32)]) {
        for (product_id, quantity) in decremented.iter().rev() {
            if let Err(err) = self
                .catalog
                .adjust_stock(*product_id, *quantity, TransactionKind::Return, None)
                .await
            {
                error!(
                    product_id = %product_id,
                    quantity = quantity,
                    error = %err,
                    "failed to roll back stock decrement"
                );
            }
        }
    }
}
