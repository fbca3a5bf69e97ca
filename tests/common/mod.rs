#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, Set};
use sha2::Sha256;
use tokio::sync::mpsc;
use uuid::Uuid;

use storefront_api::auth::AuthUser;
use storefront_api::db::sync_schema;
use storefront_api::entities::{
    cart_item, color, coupon, customer_address, product, product_variant, size, Product,
    ProductVariant,
};
use storefront_api::errors::ServiceError;
use storefront_api::events::{Event, EventSender};
use storefront_api::services::coupons::CouponService;
use storefront_api::services::inventory::InventoryService;
use storefront_api::services::orders::OrderService;
use storefront_api::services::payments::{GatewayIntent, PaymentGateway};
use storefront_api::services::pricing::PricingService;
use storefront_api::services::settlement::SettlementService;

pub const PAYMENT_SECRET: &str = "test-payment-secret";

/// In-memory SQLite with a single connection: every pooled handle must see
/// the same database, and `sqlite::memory:` is per-connection.
pub async fn test_db() -> Arc<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    sync_schema(&db).await.unwrap();
    Arc::new(db)
}

/// Deterministic gateway double. Counts intents and can be flipped to fail.
pub struct StubGateway {
    pub fail: bool,
    counter: AtomicU64,
}

impl StubGateway {
    pub fn new() -> Self {
        Self {
            fail: false,
            counter: AtomicU64::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            counter: AtomicU64::new(0),
        }
    }

    pub fn intents_created(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_intent(
        &self,
        amount_minor_units: i64,
        currency: &str,
        _receipt: &str,
    ) -> Result<GatewayIntent, ServiceError> {
        if self.fail {
            return Err(ServiceError::Gateway("stub gateway down".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayIntent {
            gateway_order_id: format!("order_stub{}", n),
            amount_minor_units,
            currency: currency.to_string(),
        })
    }

    fn key_id(&self) -> &str {
        "rzp_test_stub"
    }
}

pub struct TestCtx {
    pub db: Arc<DatabaseConnection>,
    pub settlement: SettlementService,
    pub orders: OrderService,
    pub coupons: CouponService,
    pub inventory: InventoryService,
    // Keeps the event channel open for the lifetime of the test.
    _rx: mpsc::Receiver<Event>,
}

pub async fn setup_with_gateway(gateway: Arc<dyn PaymentGateway>) -> TestCtx {
    let db = test_db().await;
    let (tx, rx) = mpsc::channel(64);
    let events = EventSender::new(tx);
    let orders = OrderService::new(db.clone());
    let settlement = SettlementService::new(
        db.clone(),
        gateway,
        PricingService::new(db.clone()),
        CouponService::new(db.clone()),
        OrderService::new(db.clone()),
        InventoryService::new(),
        events,
        "INR".to_string(),
        PAYMENT_SECRET.to_string(),
    );
    TestCtx {
        db: db.clone(),
        settlement,
        orders,
        coupons: CouponService::new(db.clone()),
        inventory: InventoryService::new(),
        _rx: rx,
    }
}

pub async fn setup() -> TestCtx {
    setup_with_gateway(Arc::new(StubGateway::new())).await
}

pub fn buyer() -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        name: "Asha Rao".to_string(),
        email: "asha@example.com".to_string(),
        phone: Some("+919800000000".to_string()),
    }
}

/// Seeds a product with one variant and returns the variant id.
pub async fn seed_variant(db: &DatabaseConnection, name: &str, price: Decimal, stock: i32) -> Uuid {
    let now = Utc::now();
    let product_id = Uuid::new_v4();
    product::ActiveModel {
        id: Set(product_id),
        name: Set(name.to_string()),
        description: Set(None),
        base_price: Set(price),
        sale_price: Set(None),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();

    let color_id = Uuid::new_v4();
    color::ActiveModel {
        id: Set(color_id),
        name: Set("Blue".to_string()),
        hex_code: Set(Some("#0000ff".to_string())),
    }
    .insert(db)
    .await
    .unwrap();

    let size_id = Uuid::new_v4();
    size::ActiveModel {
        id: Set(size_id),
        label: Set("M".to_string()),
        sort_order: Set(2),
    }
    .insert(db)
    .await
    .unwrap();

    let variant_id = Uuid::new_v4();
    product_variant::ActiveModel {
        id: Set(variant_id),
        product_id: Set(product_id),
        color_id: Set(color_id),
        size_id: Set(size_id),
        sku: Set(format!("SKU-{}", &variant_id.simple().to_string()[..8])),
        stock_quantity: Set(stock),
        price_override: Set(None),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();

    variant_id
}

pub async fn seed_address(db: &DatabaseConnection, user_id: Uuid) -> Uuid {
    let address_id = Uuid::new_v4();
    customer_address::ActiveModel {
        id: Set(address_id),
        user_id: Set(user_id),
        full_name: Set("Asha Rao".to_string()),
        phone: Set("+919800000000".to_string()),
        line1: Set("12 MG Road".to_string()),
        line2: Set(None),
        city: Set("Bengaluru".to_string()),
        state: Set("Karnataka".to_string()),
        postal_code: Set("560001".to_string()),
        country: Set("IN".to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap();
    address_id
}

pub struct CouponSpec {
    pub code: &'static str,
    pub discount_type: &'static str,
    pub discount_value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_amount: Decimal,
    pub usage_limit: Option<i32>,
    pub per_user_limit: i32,
}

pub async fn seed_coupon(db: &DatabaseConnection, spec: CouponSpec) -> Uuid {
    let now = Utc::now();
    let coupon_id = Uuid::new_v4();
    coupon::ActiveModel {
        id: Set(coupon_id),
        code: Set(spec.code.to_string()),
        description: Set(None),
        discount_type: Set(spec.discount_type.to_string()),
        discount_value: Set(spec.discount_value),
        max_discount_amount: Set(spec.max_discount_amount),
        min_order_amount: Set(spec.min_order_amount),
        valid_from: Set(now - Duration::days(1)),
        valid_until: Set(Some(now + Duration::days(30))),
        usage_limit: Set(spec.usage_limit),
        used_count: Set(0),
        per_user_limit: Set(spec.per_user_limit),
        active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();
    coupon_id
}

pub async fn seed_cart_line(db: &DatabaseConnection, user_id: Uuid, variant_id: Uuid, quantity: i32) {
    let now = Utc::now();
    cart_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        variant_id: Set(variant_id),
        quantity: Set(quantity),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();
}

/// Flips the parent product of a variant to inactive.
pub async fn deactivate_product(db: &DatabaseConnection, variant_id: Uuid) {
    let variant = ProductVariant::find_by_id(variant_id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    let mut product: product::ActiveModel = Product::find_by_id(variant.product_id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .into();
    product.active = Set(false);
    product.update(db).await.unwrap();
}

pub async fn stock_of(db: &DatabaseConnection, variant_id: Uuid) -> i32 {
    ProductVariant::find_by_id(variant_id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .stock_quantity
}

pub fn hmac_hex(payload: &[u8], secret: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Forges the signature the payment widget would return for a captured
/// payment.
pub fn payment_signature(gateway_order_id: &str, payment_id: &str) -> String {
    hmac_hex(
        format!("{}|{}", gateway_order_id, payment_id).as_bytes(),
        PAYMENT_SECRET,
    )
}
