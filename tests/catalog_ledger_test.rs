mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use storefront_core::entities::inventory_transaction::TransactionKind;
use storefront_core::errors::ServiceError;
use storefront_core::services::catalog::{CreateProductInput, UpdateProductInput};
use uuid::Uuid;

#[tokio::test]
async fn create_product_rejects_invalid_input() {
    let app = TestApp::new().await;

    let base = CreateProductInput {
        name: "Widget".to_string(),
        description: None,
        price: dec!(9.99),
        initial_stock: 5,
        category: None,
        low_stock_threshold: 2,
    };

    let empty_name = CreateProductInput {
        name: String::new(),
        ..base.clone()
    };
    assert!(matches!(
        app.services.catalog.create_product(empty_name, None).await,
        Err(ServiceError::ValidationError(_))
    ));

    let zero_price = CreateProductInput {
        price: dec!(0),
        ..base.clone()
    };
    assert!(matches!(
        app.services.catalog.create_product(zero_price, None).await,
        Err(ServiceError::ValidationError(_))
    ));

    let negative_price = CreateProductInput {
        price: dec!(-1.50),
        ..base.clone()
    };
    assert!(matches!(
        app.services
            .catalog
            .create_product(negative_price, None)
            .await,
        Err(ServiceError::ValidationError(_))
    ));

    let negative_stock = CreateProductInput {
        initial_stock: -1,
        ..base.clone()
    };
    assert!(matches!(
        app.services
            .catalog
            .create_product(negative_stock, None)
            .await,
        Err(ServiceError::ValidationError(_))
    ));

    let negative_threshold = CreateProductInput {
        low_stock_threshold: -1,
        ..base
    };
    assert!(matches!(
        app.services
            .catalog
            .create_product(negative_threshold, None)
            .await,
        Err(ServiceError::ValidationError(_))
    ));
}

#[tokio::test]
async fn update_product_edits_fields_but_never_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product("Stool", dec!(20.00), 8, 3).await;

    let updated = app
        .services
        .catalog
        .update_product(
            product.id,
            UpdateProductInput {
                name: Some("Bar Stool".to_string()),
                price: Some(dec!(25.00)),
                low_stock_threshold: Some(5),
                ..Default::default()
            },
        )
        .await
        .expect("update product");

    assert_eq!(updated.name, "Bar Stool");
    assert_eq!(updated.price, dec!(25.00));
    assert_eq!(updated.low_stock_threshold, 5);
    assert_eq!(updated.stock_quantity, 8, "stock is not editable here");

    // The ledger saw nothing: edits are not stock movements.
    let history = app.services.ledger.history(product.id).await.unwrap();
    assert_eq!(history.len(), 1);

    // A lowered threshold feeds straight into alerting.
    assert!(!app.services.alerts.is_low_stock(product.id).await.unwrap());
    app.services
        .catalog
        .update_product(
            product.id,
            UpdateProductInput {
                low_stock_threshold: Some(8),
                ..Default::default()
            },
        )
        .await
        .expect("raise threshold");
    assert!(app.services.alerts.is_low_stock(product.id).await.unwrap());
}

#[tokio::test]
async fn update_product_rejects_invalid_edits() {
    let app = TestApp::new().await;
    let product = app.seed_product("Bench", dec!(55.00), 4, 2).await;

    let cases = [
        UpdateProductInput {
            price: Some(dec!(0)),
            ..Default::default()
        },
        UpdateProductInput {
            price: Some(dec!(-4.00)),
            ..Default::default()
        },
        UpdateProductInput {
            low_stock_threshold: Some(-1),
            ..Default::default()
        },
        UpdateProductInput {
            name: Some(String::new()),
            ..Default::default()
        },
    ];
    for input in cases {
        let err = app
            .services
            .catalog
            .update_product(product.id, input)
            .await
            .expect_err("invalid edit must fail");
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    let fresh = app.services.catalog.get_product(product.id).await.unwrap();
    assert_eq!(fresh.price, dec!(55.00));
    assert_eq!(fresh.low_stock_threshold, 2);

    assert!(matches!(
        app.services
            .catalog
            .update_product(Uuid::new_v4(), UpdateProductInput::default())
            .await,
        Err(ServiceError::ProductNotFound(_))
    ));
}

#[tokio::test]
async fn initial_stock_is_recorded_as_a_restock_entry() {
    let app = TestApp::new().await;

    let product = app.seed_product("Lamp", dec!(24.00), 7, 3).await;

    let history = app
        .services
        .ledger
        .history(product.id)
        .await
        .expect("ledger history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind(), Some(TransactionKind::Restock));
    assert_eq!(history[0].quantity_delta, 7);

    let replayed = app
        .services
        .ledger
        .replayed_quantity(product.id)
        .await
        .expect("replayed quantity");
    assert_eq!(replayed, 7);
}

#[tokio::test]
async fn zero_initial_stock_leaves_an_empty_ledger() {
    let app = TestApp::new().await;

    let product = app.seed_product("Preorder Item", dec!(99.00), 0, 5).await;

    let history = app
        .services
        .ledger
        .history(product.id)
        .await
        .expect("ledger history");
    assert!(history.is_empty());
}

#[tokio::test]
async fn products_list_in_name_order() {
    let app = TestApp::new().await;

    app.seed_product("Zither", dec!(120.00), 1, 1).await;
    app.seed_product("Anvil", dec!(80.00), 1, 1).await;
    app.seed_product("Mug", dec!(6.00), 1, 1).await;

    let products = app
        .services
        .catalog
        .list_products()
        .await
        .expect("list products");
    let names: Vec<_> = products.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Anvil", "Mug", "Zither"]);
}

#[tokio::test]
async fn restock_appends_to_the_ledger_and_updates_stock() {
    let app = TestApp::new().await;
    let staff = Uuid::new_v4();

    let product = app.seed_product("Chair", dec!(45.00), 4, 2).await;

    let updated = app
        .services
        .catalog
        .restock(product.id, 6, Some(staff))
        .await
        .expect("restock");
    assert_eq!(updated.stock_quantity, 10);

    let history = app
        .services
        .ledger
        .history(product.id)
        .await
        .expect("ledger history");
    assert_eq!(history.len(), 2);
    let last = history.last().unwrap();
    assert_eq!(last.kind(), Some(TransactionKind::Restock));
    assert_eq!(last.quantity_delta, 6);
    assert_eq!(last.actor, Some(staff));

    let replayed = app
        .services
        .ledger
        .replayed_quantity(product.id)
        .await
        .expect("replayed quantity");
    assert_eq!(replayed, i64::from(updated.stock_quantity));
}

#[tokio::test]
async fn restock_rejects_non_positive_quantities() {
    let app = TestApp::new().await;
    let product = app.seed_product("Desk", dec!(150.00), 2, 1).await;

    for quantity in [0, -3] {
        let err = app
            .services
            .catalog
            .restock(product.id, quantity, None)
            .await
            .expect_err("non-positive restock must fail");
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    let fresh = app
        .services
        .catalog
        .get_product(product.id)
        .await
        .expect("get product");
    assert_eq!(fresh.stock_quantity, 2);
}

#[tokio::test]
async fn adjust_stock_rejects_kind_sign_mismatches() {
    let app = TestApp::new().await;
    let product = app.seed_product("Rug", dec!(60.00), 5, 2).await;

    // A sale must carry a negative delta, restocks and returns positive ones.
    let cases = [
        (3, TransactionKind::Sale),
        (-3, TransactionKind::Restock),
        (-3, TransactionKind::Return),
        (0, TransactionKind::Sale),
    ];
    for (delta, kind) in cases {
        let err = app
            .services
            .catalog
            .adjust_stock(product.id, delta, kind, None)
            .await
            .expect_err("mismatched delta must fail");
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    let history = app
        .services
        .ledger
        .history(product.id)
        .await
        .expect("ledger history");
    assert_eq!(history.len(), 1, "rejected adjustments must not append");
}

#[tokio::test]
async fn insufficient_stock_adjustment_changes_nothing() {
    let app = TestApp::new().await;
    let product = app.seed_product("Vase", dec!(30.00), 2, 1).await;

    let err = app
        .services
        .catalog
        .adjust_stock(product.id, -3, TransactionKind::Sale, None)
        .await
        .expect_err("overdraw must fail");
    match err {
        ServiceError::InsufficientStock {
            product_id,
            requested,
            available,
        } => {
            assert_eq!(product_id, product.id);
            assert_eq!(requested, 3);
            assert_eq!(available, 2);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    let fresh = app
        .services
        .catalog
        .get_product(product.id)
        .await
        .expect("get product");
    assert_eq!(fresh.stock_quantity, 2);

    let history = app
        .services
        .ledger
        .history(product.id)
        .await
        .expect("ledger history");
    assert_eq!(history.len(), 1, "failed adjustment must not append");
}

#[tokio::test]
async fn ledger_replay_matches_stock_after_mixed_traffic() {
    let app = TestApp::new().await;
    let product = app.seed_product("Kettle", dec!(35.00), 10, 3).await;

    app.services
        .catalog
        .adjust_stock(product.id, -4, TransactionKind::Sale, None)
        .await
        .expect("sale");
    app.services
        .catalog
        .adjust_stock(product.id, 2, TransactionKind::Return, None)
        .await
        .expect("return");
    let updated = app
        .services
        .catalog
        .restock(product.id, 5, None)
        .await
        .expect("restock");

    assert_eq!(updated.stock_quantity, 13);

    let replayed = app
        .services
        .ledger
        .replayed_quantity(product.id)
        .await
        .expect("replayed quantity");
    assert_eq!(replayed, i64::from(updated.stock_quantity));
}

#[tokio::test]
async fn unknown_product_is_reported_consistently() {
    let app = TestApp::new().await;
    let missing = Uuid::new_v4();

    assert!(matches!(
        app.services.catalog.get_product(missing).await,
        Err(ServiceError::ProductNotFound(id)) if id == missing
    ));
    assert!(matches!(
        app.services.ledger.history(missing).await,
        Err(ServiceError::ProductNotFound(id)) if id == missing
    ));
    assert!(matches!(
        app.services
            .catalog
            .adjust_stock(missing, 5, TransactionKind::Restock, None)
            .await,
        Err(ServiceError::ProductNotFound(id)) if id == missing
    ));
    assert!(matches!(
        app.services.alerts.is_low_stock(missing).await,
        Err(ServiceError::ProductNotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn low_stock_alerting_tracks_thresholds() {
    let app = TestApp::new().await;

    // At threshold counts as low; one above does not.
    let at_threshold = app.seed_product("Bolt", dec!(0.50), 10, 10).await;
    let above = app.seed_product("Nut", dec!(0.40), 11, 10).await;
    let below = app.seed_product("Washer", dec!(0.10), 2, 10).await;

    assert!(app
        .services
        .alerts
        .is_low_stock(at_threshold.id)
        .await
        .unwrap());
    assert!(!app.services.alerts.is_low_stock(above.id).await.unwrap());
    assert!(app.services.alerts.is_low_stock(below.id).await.unwrap());

    let low = app
        .services
        .alerts
        .low_stock_products()
        .await
        .expect("low stock products");
    let names: Vec<_> = low.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Bolt", "Washer"]);

    // Selling one unit of the borderline product tips it into the report.
    app.services
        .catalog
        .adjust_stock(above.id, -1, TransactionKind::Sale, None)
        .await
        .expect("sale");

    let low = app
        .services
        .alerts
        .low_stock_products()
        .await
        .expect("low stock products");
    let names: Vec<_> = low.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Bolt", "Nut", "Washer"]);
}
