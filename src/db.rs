use std::time::Duration;

use sea_orm::{
    sea_query::{Index, IndexCreateStatement},
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema,
};
use tracing::info;

use crate::config::AppConfig;
use crate::entities;
use crate::errors::ServiceError;

/// Type alias for a database connection pool.
pub type DbPool = DatabaseConnection;

/// Establishes the connection pool from application configuration.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(cfg.database_url.clone());
    options
        .max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(cfg.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(cfg.db_idle_timeout_secs))
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    pool.ping().await?;
    info!("Database connection established");
    Ok(pool)
}

/// Creates all tables and indexes derived from the entity definitions.
///
/// Used at startup when `auto_migrate` is set and by the test harness.
/// Single-column unique constraints (order number, coupon code, SKU) come
/// from the entity annotations; the composite redemption index is added
/// explicitly.
pub async fn sync_schema(db: &DatabaseConnection) -> Result<(), ServiceError> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut tables = vec![
        schema.create_table_from_entity(entities::Product),
        schema.create_table_from_entity(entities::Color),
        schema.create_table_from_entity(entities::Size),
        schema.create_table_from_entity(entities::ProductVariant),
        schema.create_table_from_entity(entities::CustomerAddress),
        schema.create_table_from_entity(entities::CartItem),
        schema.create_table_from_entity(entities::Coupon),
        schema.create_table_from_entity(entities::CouponUsage),
        schema.create_table_from_entity(entities::Order),
        schema.create_table_from_entity(entities::OrderItem),
        schema.create_table_from_entity(entities::InventoryLog),
    ];
    for stmt in tables.iter_mut() {
        stmt.if_not_exists();
        db.execute(backend.build(&*stmt)).await?;
    }

    // One redemption row per (coupon, user, order): makes settlement replays
    // (duplicate webhook delivery) unable to double-record a redemption.
    let redemption_idx: IndexCreateStatement = Index::create()
        .name("ux_coupon_usages_coupon_user_order")
        .table(entities::CouponUsage)
        .col(entities::coupon_usage::Column::CouponId)
        .col(entities::coupon_usage::Column::UserId)
        .col(entities::coupon_usage::Column::OrderId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&redemption_idx)).await?;

    info!("Database schema synced");
    Ok(())
}
