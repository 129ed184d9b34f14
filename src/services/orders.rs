use crate::{
    db::DbPool,
    entities::inventory_transaction::TransactionKind,
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::{adjust_stock_on, unwrap_transaction_error},
};
use chrono::Utc;
use dashmap::DashMap;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// An order together with its owned line items.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Service owning the order lifecycle: placed -> paid -> delivered, with
/// cancellation from placed or paid. Transitions on the same order id are
/// serialized through a per-order lock table; cancellation restores stock in
/// the same transaction as the status flip, so a reader can never observe a
/// cancelled order whose stock has not come back.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    transition_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db,
            event_sender,
            transition_locks: Arc::new(DashMap::new()),
        }
    }

    /// Orders currently tracked by the transition lock table. Terminal
    /// orders are evicted once their final transition commits.
    pub fn tracked_orders(&self) -> usize {
        self.transition_locks.len()
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::OrderNotFound(order_id))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(OrderDetails { order, items })
    }

    /// All orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<order::Model>, ServiceError> {
        Ok(OrderEntity::find()
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// A customer's orders, newest first.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn list_orders_by_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<order::Model>, ServiceError> {
        Ok(OrderEntity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Moves an order along its lifecycle. Illegal transitions fail with
    /// `InvalidTransition` naming both statuses and leave everything
    /// untouched.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        actor: Option<Uuid>,
    ) -> Result<order::Model, ServiceError> {
        // Serialize transitions per order id; transitions on different
        // orders proceed independently.
        let lock = self
            .transition_locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _guard = lock.lock().await;

        let (updated, old_status) = self
            .db
            .transaction::<_, (order::Model, OrderStatus), ServiceError>(move |txn| {
                Box::pin(async move {
                    let order = OrderEntity::find_by_id(order_id)
                        .one(txn)
                        .await?
                        .ok_or(ServiceError::OrderNotFound(order_id))?;

                    let current = order.status().ok_or_else(|| {
                        ServiceError::validation(format!(
                            "order {} has unrecognized stored status '{}'",
                            order_id, order.status
                        ))
                    })?;

                    if !current.can_transition_to(new_status) {
                        return Err(ServiceError::InvalidTransition {
                            from: current,
                            to: new_status,
                        });
                    }

                    let now = Utc::now();

                    if new_status == OrderStatus::Cancelled {
                        // Restore every item's quantity inside this same
                        // transaction; returns can never violate the
                        // non-negative invariant. Restoring in product-id
                        // order means concurrent cancellations that share
                        // products take row locks in the same order.
                        let mut items = OrderItemEntity::find()
                            .filter(order_item::Column::OrderId.eq(order_id))
                            .all(txn)
                            .await?;
                        items.sort_by_key(|item| item.product_id);
                        for item in &items {
                            adjust_stock_on(
                                txn,
                                item.product_id,
                                item.quantity,
                                TransactionKind::Return,
                                actor,
                            )
                            .await?;
                        }
                    }

                    let mut active: order::ActiveModel = order.into();
                    active.status = Set(new_status.as_str().to_string());
                    active.updated_at = Set(Some(now));
                    match new_status {
                        OrderStatus::Paid => active.paid_at = Set(Some(now)),
                        OrderStatus::Delivered => active.delivered_at = Set(Some(now)),
                        _ => {}
                    }

                    let updated = active.update(txn).await?;
                    Ok((updated, current))
                })
            })
            .await
            .map_err(unwrap_transaction_error)?;

        // Terminal orders take no further transitions; their lock entry
        // would otherwise live for the life of the process.
        drop(_guard);
        if new_status.is_terminal() {
            self.transition_locks.remove(&order_id);
        }

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "order status updated"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await
        {
            warn!(order_id = %order_id, error = %e, "failed to send order status changed event");
        }

        Ok(updated)
    }
}
