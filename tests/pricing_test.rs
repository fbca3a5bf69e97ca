//! Pricing engine failure modes: the user-facing messages must name the
//! offending item precisely, since they surface verbatim at checkout.

mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::*;
use storefront_api::errors::ServiceError;
use storefront_api::services::pricing::{CartLine, PricingService};

#[tokio::test]
async fn insufficient_stock_names_product_color_size_and_remaining() {
    let db = test_db().await;
    let variant_id = seed_variant(&db, "Scarf", dec!(499), 2).await;
    let pricing = PricingService::new(db.clone());

    let err = pricing
        .price_cart(&[CartLine {
            variant_id,
            quantity: 3,
        }])
        .await
        .unwrap_err();

    match err {
        ServiceError::InsufficientStock(msg) => {
            assert!(msg.contains("Scarf"), "missing product name: {}", msg);
            assert!(msg.contains("Blue"), "missing color: {}", msg);
            assert!(msg.contains("M"), "missing size: {}", msg);
            assert!(msg.contains("2"), "missing remaining quantity: {}", msg);
        }
        other => panic!("expected insufficient stock, got {:?}", other),
    }
}

#[tokio::test]
async fn deactivated_product_is_named_as_unavailable() {
    let db = test_db().await;
    let variant_id = seed_variant(&db, "Flannel Shirt", dec!(1499), 5).await;
    deactivate_product(&db, variant_id).await;
    let pricing = PricingService::new(db.clone());

    let err = pricing
        .price_cart(&[CartLine {
            variant_id,
            quantity: 1,
        }])
        .await
        .unwrap_err();

    match err {
        ServiceError::Unavailable(msg) => {
            assert!(msg.contains("Flannel Shirt"), "missing product name: {}", msg);
        }
        other => panic!("expected unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn unknown_variant_id_is_not_found() {
    let db = test_db().await;
    seed_variant(&db, "Polo Shirt", dec!(799), 5).await;
    let pricing = PricingService::new(db.clone());

    let missing = Uuid::new_v4();
    let err = pricing
        .price_cart(&[CartLine {
            variant_id: missing,
            quantity: 1,
        }])
        .await
        .unwrap_err();

    match err {
        ServiceError::NotFound(msg) => {
            assert!(msg.contains(&missing.to_string()), "missing variant id: {}", msg);
        }
        other => panic!("expected not found, got {:?}", other),
    }
}

#[tokio::test]
async fn valid_cart_prices_every_line_exactly() {
    let db = test_db().await;
    let variant_id = seed_variant(&db, "Oxford Shirt", dec!(1299), 10).await;
    let pricing = PricingService::new(db.clone());

    let cart = pricing
        .price_cart(&[CartLine {
            variant_id,
            quantity: 3,
        }])
        .await
        .unwrap();

    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].unit_price, dec!(1299));
    assert_eq!(cart.lines[0].line_total, dec!(3897));
    assert_eq!(cart.subtotal, dec!(3897));
    assert_eq!(cart.lines[0].product_name, "Oxford Shirt");
    assert_eq!(cart.lines[0].color_name, "Blue");
    assert_eq!(cart.lines[0].size_label, "M");
}

#[tokio::test]
async fn non_positive_quantity_is_rejected() {
    let db = test_db().await;
    let variant_id = seed_variant(&db, "Polo Shirt", dec!(799), 5).await;
    let pricing = PricingService::new(db.clone());

    let err = pricing
        .price_cart(&[CartLine {
            variant_id,
            quantity: 0,
        }])
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Validation(_));
}
