use std::sync::Arc;

use rust_decimal::Decimal;
use storefront_core::{
    config::AppConfig,
    db,
    entities::product,
    events::{process_events, EventSender},
    services::catalog::CreateProductInput,
    AppServices,
};
use tokio::sync::mpsc;

/// Helper harness for spinning up the service graph backed by an in-memory
/// SQLite database. Each `TestApp` gets its own fresh schema.
pub struct TestApp {
    pub services: AppServices,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        // A single connection keeps every query on the same in-memory
        // database handle.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.auto_migrate = true;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        db::check_connection(&pool)
            .await
            .expect("test database did not answer ping");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(process_events(event_rx));

        let services = AppServices::build(db_arc, event_sender);

        Self {
            services,
            _event_task: event_task,
        }
    }

    /// Seed a product with the given stock level and threshold.
    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        initial_stock: i32,
        low_stock_threshold: i32,
    ) -> product::Model {
        self.services
            .catalog
            .create_product(
                CreateProductInput {
                    name: name.to_string(),
                    description: Some("seeded for integration tests".to_string()),
                    price,
                    initial_stock,
                    category: None,
                    low_stock_threshold,
                },
                None,
            )
            .await
            .expect("seed product for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}
