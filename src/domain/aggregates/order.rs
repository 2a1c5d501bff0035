//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::aggregates::cart::CartLedger;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::reporting::SaleRecord;
use crate::domain::value_objects::{Money, ProductId, Quantity};
use crate::{Result, StoreError};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: String,
    phone: String,
    status: OrderStatus,
    items: Vec<LineItem>,
    total: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem { pub product_id: ProductId, pub name: String, pub quantity: Quantity, pub unit_price: Money, pub total: Money }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, PaymentRequested }

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(custom = "msisdn")]
    pub phone: String,
}

/// Body of the mobile-money push sent to the payment gateway.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PaymentRequest {
    pub phone: String,
    pub amount: Decimal,
}

/// Accepts `2547XXXXXXXX`, `+2547XXXXXXXX` and `07XXXXXXXX` (and the `01`
/// range) and returns the `254` form.
pub fn normalize_msisdn(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    let digits = digits.strip_prefix('+').unwrap_or(&digits);
    if !digits.chars().all(|c| c.is_ascii_digit()) { return None; }
    let national = match (digits.len(), digits) {
        (12, d) if d.starts_with("254") => &d[3..],
        (10, d) if d.starts_with('0') => &d[1..],
        _ => return None,
    };
    if !(national.starts_with('7') || national.starts_with('1')) { return None; }
    Some(format!("254{national}"))
}

fn msisdn(phone: &str) -> std::result::Result<(), ValidationError> {
    match normalize_msisdn(phone) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("invalid_phone")),
    }
}

impl Order {
    pub fn place(cart: &CartLedger, request: &CheckoutRequest) -> Result<Self> {
        request.validate()?;
        if cart.is_empty() { return Err(StoreError::EmptyCart); }
        let phone = normalize_msisdn(&request.phone).unwrap_or_else(|| request.phone.clone());
        let items = cart.lines().iter().map(|l| -> Result<LineItem> { Ok(LineItem {
            product_id: l.product_id, name: l.name.clone(), quantity: l.quantity,
            unit_price: l.unit_price.clone(), total: l.line_total()?,
        }) }).collect::<Result<Vec<_>>>()?;
        let total = cart.total()?;
        let now = Utc::now();
        let id = Uuid::now_v7().to_string();
        let mut order = Self {
            id: id.clone(), phone, status: OrderStatus::Pending, items, total,
            created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_id: id, total: order.total.amount() }));
        Ok(order)
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn phone(&self) -> &str { &self.phone }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn total(&self) -> &Money { &self.total }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn stock_lines(&self) -> Vec<(ProductId, Quantity)> { self.items.iter().map(|i| (i.product_id, i.quantity)).collect() }

    /// The gateway charges whole cents; the amount is the cart total rounded
    /// for display.
    pub fn request_payment(&mut self) -> PaymentRequest {
        let request = PaymentRequest { phone: self.phone.clone(), amount: self.total.rounded() };
        self.status = OrderStatus::PaymentRequested;
        self.touch();
        self.raise_event(DomainEvent::Order(OrderEvent::PaymentRequested {
            order_id: self.id.clone(), phone: request.phone.clone(), amount: request.amount,
        }));
        request
    }

    /// One sale record per line, stamped with the order time.
    pub fn sale_records(&self) -> Vec<SaleRecord> {
        self.items.iter().map(|i| SaleRecord {
            product_id: Some(i.product_id),
            product_name: i.name.clone(),
            quantity: i.quantity.value(),
            revenue: i.total.amount(),
            timestamp: self.created_at,
        }).collect()
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::Product;
    use crate::domain::value_objects::PricingField;
    use rust_decimal_macros::dec;

    fn filled_cart() -> CartLedger {
        let mut cart = CartLedger::new("KES", PricingField::Price);
        cart.add_item(&Product::new(ProductId::new(1), "Controller", dec!(1000)), 2).unwrap();
        cart.add_item(&Product::new(ProductId::new(2), "Cable", dec!(500.255)), 1).unwrap();
        cart
    }

    fn checkout(phone: &str) -> CheckoutRequest { CheckoutRequest { phone: phone.into() } }

    #[test]
    fn test_order_workflow() {
        let mut order = Order::place(&filled_cart(), &checkout("0712345678")).unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.phone(), "254712345678");
        assert_eq!(order.total().amount(), dec!(2500.255));

        let payment = order.request_payment();
        assert_eq!(payment.amount, dec!(2500.26));
        assert_eq!(order.status(), OrderStatus::PaymentRequested);
        assert_eq!(order.take_events().len(), 2);
    }

    #[test]
    fn test_sale_records_match_lines() {
        let order = Order::place(&filled_cart(), &checkout("254712345678")).unwrap();
        let records = order.sale_records();
        assert_eq!(records.len(), 2);
        let revenue: Decimal = records.iter().map(|r| r.revenue).sum();
        assert_eq!(revenue, order.total().amount());
        assert!(records.iter().all(|r| r.timestamp == order.created_at()));
    }

    #[test]
    fn test_empty_cart_cannot_be_placed() {
        let cart = CartLedger::new("KES", PricingField::Price);
        assert!(matches!(Order::place(&cart, &checkout("254712345678")), Err(StoreError::EmptyCart)));
    }

    #[test]
    fn test_phone_validation() {
        assert!(matches!(Order::place(&filled_cart(), &checkout("12345")), Err(StoreError::Validation(_))));
        assert_eq!(normalize_msisdn("+254 110 123 456").as_deref(), Some("254110123456"));
        assert_eq!(normalize_msisdn("254812345678"), None);
        assert_eq!(normalize_msisdn("07123abc78"), None);
    }
}
