use crate::{
    db::DbPool,
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
};
use sea_orm::sea_query::Expr;
use sea_orm::{EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Pure derived view over the catalog: a product is low-stock iff its
/// stock_quantity is at or below its own low_stock_threshold. Nothing here
/// mutates; results are recomputed on demand.
#[derive(Clone)]
pub struct StockAlertService {
    db: Arc<DbPool>,
}

impl StockAlertService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn is_low_stock(&self, product_id: Uuid) -> Result<bool, ServiceError> {
        let product = ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::ProductNotFound(product_id))?;

        Ok(product.is_low_stock())
    }

    /// All products at or below their threshold, in stable name order.
    #[instrument(skip(self))]
    pub async fn low_stock_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(ProductEntity::find()
            .filter(
                Expr::col(product::Column::StockQuantity)
                    .lte(Expr::col(product::Column::LowStockThreshold)),
            )
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await?)
    }
}
