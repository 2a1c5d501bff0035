//! Domain events
use crate::domain::value_objects::ProductId;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProductEvent {
    Created { product_id: ProductId, name: String },
    Updated { product_id: ProductId },
    StockSet { product_id: ProductId, stock: u32 },
    StockDeducted { product_id: ProductId, quantity: u32, remaining: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum OrderEvent {
    Placed { order_id: String, total: Decimal },
    PaymentRequested { order_id: String, phone: String, amount: Decimal },
}
