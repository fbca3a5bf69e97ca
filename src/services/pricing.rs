//! Pricing & validation engine.
//!
//! Resolves authoritative unit prices and validates requested quantities
//! against live stock. Pure read + compute; the settlement coordinator owns
//! all writes.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{color, product, product_variant, size, Color, Product, ProductVariant, Size};
use crate::errors::ServiceError;

/// A client-submitted cart line. Only the variant id and quantity are
/// trusted; everything else is resolved against the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CartLine {
    pub variant_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// One validated line with its resolved price and the denormalized fields
/// the order-item snapshot needs.
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub variant_id: Uuid,
    pub product_name: String,
    pub color_name: String,
    pub size_label: String,
    pub sku: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
}

#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Validates every line against the live catalog and resolves unit
    /// prices (`price_override ?? sale_price ?? base_price`).
    ///
    /// Re-run at order creation; stock is re-checked again by the
    /// conditional decrement when the reservation actually commits.
    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn price_cart(&self, lines: &[CartLine]) -> Result<PricedCart, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::Validation("Cart is empty".to_string()));
        }
        for line in lines {
            if line.quantity < 1 {
                return Err(ServiceError::Validation(
                    "Quantity must be a positive integer".to_string(),
                ));
            }
        }

        let db = &*self.db;
        let variant_ids: Vec<Uuid> = lines.iter().map(|l| l.variant_id).collect();

        let variants: HashMap<Uuid, product_variant::Model> = ProductVariant::find()
            .filter(product_variant::Column::Id.is_in(variant_ids.clone()))
            .all(db)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect();

        for line in lines {
            if !variants.contains_key(&line.variant_id) {
                return Err(ServiceError::NotFound(format!(
                    "Variant {} not found",
                    line.variant_id
                )));
            }
        }

        let product_ids: Vec<Uuid> = variants.values().map(|v| v.product_id).collect();
        let color_ids: Vec<Uuid> = variants.values().map(|v| v.color_id).collect();
        let size_ids: Vec<Uuid> = variants.values().map(|v| v.size_id).collect();

        let products: HashMap<Uuid, product::Model> = Product::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        let colors: HashMap<Uuid, color::Model> = Color::find()
            .filter(color::Column::Id.is_in(color_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        let sizes: HashMap<Uuid, size::Model> = Size::find()
            .filter(size::Column::Id.is_in(size_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        let mut priced = Vec::with_capacity(lines.len());
        let mut subtotal = Decimal::ZERO;

        for line in lines {
            let variant = &variants[&line.variant_id];
            let product = products.get(&variant.product_id).ok_or_else(|| {
                ServiceError::Internal(format!("Variant {} has no parent product", variant.id))
            })?;
            let color = colors.get(&variant.color_id).ok_or_else(|| {
                ServiceError::Internal(format!("Variant {} has no color", variant.id))
            })?;
            let size = sizes.get(&variant.size_id).ok_or_else(|| {
                ServiceError::Internal(format!("Variant {} has no size", variant.id))
            })?;

            if !variant.active || !product.active {
                return Err(ServiceError::Unavailable(format!(
                    "{} is no longer available",
                    product.name
                )));
            }
            if line.quantity > variant.stock_quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "{} ({}, {}) has only {} left",
                    product.name, color.name, size.label, variant.stock_quantity
                )));
            }

            let unit_price = variant
                .price_override
                .or(product.sale_price)
                .unwrap_or(product.base_price);
            let line_total = unit_price * Decimal::from(line.quantity);
            subtotal += line_total;

            priced.push(PricedLine {
                variant_id: variant.id,
                product_name: product.name.clone(),
                color_name: color.name.clone(),
                size_label: size.label.clone(),
                sku: variant.sku.clone(),
                quantity: line.quantity,
                unit_price,
                line_total,
            });
        }

        Ok(PricedCart {
            lines: priced,
            subtotal,
        })
    }
}
