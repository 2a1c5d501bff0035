//! Storefront domain: catalog, cart, orders and sales reporting
pub mod aggregates;
pub mod events;
pub mod reporting;
pub mod value_objects;
