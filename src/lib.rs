//! Gamestore Commerce
//!
//! Cart ledger and sales reporting for a small gaming-goods storefront.
//!
//! ## Features
//! - Product catalog with search and stock management
//! - Shopping cart with exact decimal totals and pluggable persistence
//! - Checkout into orders and mobile-payment push payloads
//! - Sales feed ingestion with an explicit malformed-record policy
//! - Per-product breakdown and daily revenue trend reports

pub mod api;
pub mod config;
pub mod domain;
pub mod ingest;
pub mod persistence;

use thiserror::Error;

pub use domain::aggregates::{Cart, CartLedger, CartLine, Catalog, NewProduct, Order, Product, ProductUpdate};
pub use domain::reporting::{DailyTrendPoint, ReportBreakdownEntry, SaleRecord, SalesAggregator, SalesReport};
pub use domain::value_objects::{Money, PricingField, ProductId, Quantity};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Malformed sale record #{index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("Insufficient inventory for product {product_id}: requested {requested}, available {available}")]
    InsufficientInventory { product_id: ProductId, requested: u32, available: u32 },

    #[error("Invalid stock value: {0}")]
    InvalidStock(i64),

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("Amount out of range: {0}")]
    AmountOverflow(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Storage error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
