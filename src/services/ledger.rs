use crate::{
    db::DbPool,
    entities::inventory_transaction::{self, Entity as InventoryTransactionEntity},
    entities::product::Entity as ProductEntity,
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Read side of the inventory ledger. Appends happen only through
/// `CatalogService::adjust_stock`, which guarantees ledger/stock agreement.
#[derive(Clone)]
pub struct LedgerService {
    db: Arc<DbPool>,
}

impl LedgerService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Full transaction history for a product, oldest first. Finite and
    /// restartable: each call re-queries the store.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn history(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<inventory_transaction::Model>, ServiceError> {
        self.ensure_product_exists(product_id).await?;

        Ok(InventoryTransactionEntity::find()
            .filter(inventory_transaction::Column::ProductId.eq(product_id))
            .order_by_asc(inventory_transaction::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Signed sum of every ledger delta for a product. Because initial stock
    /// is itself recorded as a restock entry, this must always equal the
    /// product's current `stock_quantity`.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn replayed_quantity(&self, product_id: Uuid) -> Result<i64, ServiceError> {
        let entries = self.history(product_id).await?;
        Ok(entries.iter().map(|e| i64::from(e.quantity_delta)).sum())
    }

    async fn ensure_product_exists(&self, product_id: Uuid) -> Result<(), ServiceError> {
        ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or(ServiceError::ProductNotFound(product_id))
    }
}
