//! SeaORM entities for the storefront settlement pipeline.
//!
//! Orders and order items are snapshots: once written they are only mutated
//! by the settlement coordinator (status transitions) and never deleted.
//! `inventory_log` is append-only.

pub mod cart_item;
pub mod color;
pub mod coupon;
pub mod coupon_usage;
pub mod customer_address;
pub mod inventory_log;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_variant;
pub mod size;

pub use cart_item::Entity as CartItem;
pub use color::Entity as Color;
pub use coupon::Entity as Coupon;
pub use coupon_usage::Entity as CouponUsage;
pub use customer_address::Entity as CustomerAddress;
pub use inventory_log::Entity as InventoryLog;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use product::Entity as Product;
pub use product_variant::Entity as ProductVariant;
pub use size::Entity as Size;
