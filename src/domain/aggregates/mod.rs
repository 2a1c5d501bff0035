//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Catalog, NewProduct, Product, ProductUpdate};
pub use order::{normalize_msisdn, CheckoutRequest, LineItem, Order, OrderStatus, PaymentRequest};
pub use cart::{Cart, CartLedger, CartLine};
