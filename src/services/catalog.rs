use crate::{
    db::DbPool,
    entities::inventory_transaction::{self, TransactionKind},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    #[validate(range(min = 0, message = "Initial stock must not be negative"))]
    pub initial_stock: i32,
    pub category: Option<String>,
    #[validate(range(min = 0, message = "Low stock threshold must not be negative"))]
    pub low_stock_threshold: i32,
}

/// Partial product edit. Absent fields keep their stored values; stock is
/// never editable here, only through `adjust_stock`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub low_stock_threshold: Option<i32>,
}

/// Service owning product records and their stock levels.
///
/// `adjust_stock` is the only sanctioned mutator of `stock_quantity`; it
/// applies the delta and appends the matching ledger entry in one database
/// transaction, so the ledger and the cached stock count can never disagree.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a product. A positive initial stock is recorded as a restock
    /// ledger entry in the same transaction, keeping the replay baseline at
    /// zero for every product.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
        actor: Option<Uuid>,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        if input.price <= Decimal::ZERO {
            return Err(ServiceError::non_positive_price(input.price));
        }

        let product_id = Uuid::new_v4();
        let now = Utc::now();

        let product = self
            .db
            .transaction::<_, product::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let model = product::ActiveModel {
                        id: Set(product_id),
                        name: Set(input.name),
                        description: Set(input.description),
                        price: Set(input.price),
                        stock_quantity: Set(input.initial_stock),
                        category: Set(input.category),
                        low_stock_threshold: Set(input.low_stock_threshold),
                        created_at: Set(now),
                        updated_at: Set(Some(now)),
                    }
                    .insert(txn)
                    .await?;

                    if input.initial_stock > 0 {
                        inventory_transaction::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            product_id: Set(product_id),
                            kind: Set(TransactionKind::Restock.as_str().to_string()),
                            quantity_delta: Set(input.initial_stock),
                            actor: Set(actor),
                            created_at: Set(now),
                        }
                        .insert(txn)
                        .await?;
                    }

                    Ok(model)
                })
            })
            .await
            .map_err(unwrap_transaction_error)?;

        info!(product_id = %product.id, stock = product.stock_quantity, "product created");

        if let Err(e) = self.event_sender.send(Event::ProductCreated(product.id)).await {
            warn!(product_id = %product.id, error = %e, "failed to send product created event");
        }

        Ok(product)
    }

    /// Edits a product's descriptive fields, price, or threshold. Existing
    /// order totals and item snapshots are untouched by price changes, and
    /// `stock_quantity` is not writable through this path.
    #[instrument(skip(self, input), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        if let Some(name) = &input.name {
            if name.is_empty() || name.len() > 255 {
                return Err(ServiceError::validation(
                    "product name must be between 1 and 255 characters",
                ));
            }
        }
        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::non_positive_price(price));
            }
        }
        if let Some(threshold) = input.low_stock_threshold {
            if threshold < 0 {
                return Err(ServiceError::validation(
                    "low stock threshold must not be negative",
                ));
            }
        }

        let existing = self.get_product(product_id).await?;
        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(category) = input.category {
            active.category = Set(Some(category));
        }
        if let Some(threshold) = input.low_stock_threshold {
            active.low_stock_threshold = Set(threshold);
        }
        active.updated_at = Set(Some(Utc::now()));

        let product = active.update(&*self.db).await?;

        info!(product_id = %product.id, "product updated");

        if let Err(e) = self.event_sender.send(Event::ProductUpdated(product.id)).await {
            warn!(product_id = %product.id, error = %e, "failed to send product updated event");
        }

        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::ProductNotFound(product_id))
    }

    /// Lists every product in stable name order.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(ProductEntity::find()
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Applies a signed stock delta and appends the matching ledger entry,
    /// atomically. Fails with `InsufficientStock` when the delta would drive
    /// the count negative; the check runs inside the store's own write
    /// serialization, never against a stale read.
    #[instrument(skip(self), fields(product_id = %product_id, delta = delta, kind = %kind))]
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        delta: i32,
        kind: TransactionKind,
        actor: Option<Uuid>,
    ) -> Result<product::Model, ServiceError> {
        if delta == 0 {
            return Err(ServiceError::validation("stock delta must not be zero"));
        }
        if !kind.matches_delta(delta) {
            return Err(ServiceError::validation(format!(
                "delta {} does not match transaction kind '{}'",
                delta, kind
            )));
        }

        let product = self
            .db
            .transaction::<_, product::Model, ServiceError>(move |txn| {
                Box::pin(
                    async move { adjust_stock_on(txn, product_id, delta, kind, actor).await },
                )
            })
            .await
            .map_err(unwrap_transaction_error)?;

        info!(
            product_id = %product_id,
            delta = delta,
            kind = %kind,
            new_quantity = product.stock_quantity,
            "stock adjusted"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::StockAdjusted {
                product_id,
                kind,
                quantity_delta: delta,
                new_quantity: product.stock_quantity,
            })
            .await
        {
            warn!(product_id = %product_id, error = %e, "failed to send stock adjusted event");
        }

        Ok(product)
    }

    /// Staff entry point for receiving new stock.
    #[instrument(skip(self), fields(product_id = %product_id, quantity = quantity))]
    pub async fn restock(
        &self,
        product_id: Uuid,
        quantity: i32,
        actor: Option<Uuid>,
    ) -> Result<product::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::validation(
                "restock quantity must be positive",
            ));
        }
        self.adjust_stock(product_id, quantity, TransactionKind::Restock, actor)
            .await
    }
}

/// Transaction-scoped stock adjustment, shared between `adjust_stock` and
/// order cancellation (which must restore stock inside its own transaction).
///
/// The conditional UPDATE only matches when `stock_quantity + delta >= 0`,
/// so two writers racing for the last units cannot both succeed: the second
/// one sees zero affected rows and maps that to `InsufficientStock` (or
/// `ProductNotFound` when the row never existed).
pub(crate) async fn adjust_stock_on<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    delta: i32,
    kind: TransactionKind,
    actor: Option<Uuid>,
) -> Result<product::Model, ServiceError> {
    let update = ProductEntity::update_many()
        .col_expr(
            product::Column::StockQuantity,
            Expr::col(product::Column::StockQuantity).add(delta),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        // stock >= -delta  <=>  stock + delta >= 0
        .filter(product::Column::StockQuantity.gte(-delta))
        .exec(conn)
        .await?;

    if update.rows_affected == 0 {
        let existing = ProductEntity::find_by_id(product_id).one(conn).await?;
        return Err(match existing {
            Some(p) => ServiceError::insufficient_stock(product_id, -delta, p.stock_quantity),
            None => ServiceError::ProductNotFound(product_id),
        });
    }

    inventory_transaction::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        kind: Set(kind.as_str().to_string()),
        quantity_delta: Set(delta),
        actor: Set(actor),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;

    ProductEntity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or(ServiceError::ProductNotFound(product_id))
}

pub(crate) fn unwrap_transaction_error(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}
