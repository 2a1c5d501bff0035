//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::domain::aggregates::product::{Catalog, Product};
use crate::domain::value_objects::{Money, PricingField, ProductId, Quantity};
use crate::persistence::{CartLineRecord, CartStore};
use crate::{Result, StoreError};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: Quantity,
    pub unit_price: Money,
}

impl CartLine {
    pub fn line_total(&self) -> Result<Money> { self.unit_price.multiply(self.quantity.value()) }

    fn to_record(&self) -> CartLineRecord {
        CartLineRecord {
            product_id: self.product_id,
            name: self.name.clone(),
            quantity: i64::from(self.quantity.value()),
            unit_price: self.unit_price.amount(),
        }
    }
}

/// Read-only view of a cart for rendering.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub session_id: String,
    pub lines: Vec<CartLine>,
    pub line_count: usize,
    pub item_count: u64,
    pub total: Money,
    pub total_display: String,
    pub updated_at: DateTime<Utc>,
}

/// The active cart of one session.
///
/// Totals are derived from the lines on every call, so no mutation can leave
/// them stale. A unit price is captured when a product first enters the cart
/// and kept for the rest of the session.
///
/// Mutations are staged on a copy of the lines and only become visible once
/// the store has accepted them.
pub struct CartLedger {
    session_id: String,
    currency: String,
    pricing: PricingField,
    lines: Vec<CartLine>,
    store: Option<Arc<dyn CartStore>>,
    updated_at: DateTime<Utc>,
}

impl CartLedger {
    /// A cart that is never persisted.
    pub fn new(currency: &str, pricing: PricingField) -> Self {
        Self {
            session_id: String::new(), currency: currency.to_string(), pricing,
            lines: vec![], store: None, updated_at: Utc::now(),
        }
    }

    /// Restores the session's saved lines by replaying them as additions.
    pub fn open(session_id: impl Into<String>, store: Arc<dyn CartStore>, currency: &str, pricing: PricingField) -> Result<Self> {
        let session_id = session_id.into();
        let mut lines = vec![];
        for record in store.load(&session_id)? {
            let quantity = Quantity::new(record.quantity)?;
            merge(&mut lines, record.product_id, record.name, quantity, Money::new(record.unit_price, currency))?;
        }
        sum_lines(&lines, currency)?;
        Ok(Self { session_id, lines, store: Some(store), ..Self::new(currency, pricing) })
    }

    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn pricing(&self) -> PricingField { self.pricing }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> { self.lines.iter().find(|l| l.product_id == product_id) }
    pub fn line_count(&self) -> usize { self.lines.len() }
    pub fn item_count(&self) -> u64 { self.lines.iter().map(|l| u64::from(l.quantity.value())).sum() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn total(&self) -> Result<Money> { sum_lines(&self.lines, &self.currency) }

    pub fn add_item(&mut self, product: &Product, quantity: i64) -> Result<&CartLine> {
        let quantity = Quantity::new(quantity)?;
        let unit_price = product.unit_price(self.pricing, &self.currency);
        let mut lines = self.lines.clone();
        let idx = merge(&mut lines, product.id(), product.name().to_string(), quantity, unit_price)?;
        self.commit(lines)?;
        Ok(&self.lines[idx])
    }

    /// Looks the product up first; an unknown id is `ProductNotFound`.
    pub fn add_from_catalog(&mut self, catalog: &Catalog, product_id: ProductId, quantity: i64) -> Result<&CartLine> {
        let product = catalog.get(product_id)?;
        self.add_item(product, quantity)
    }

    /// No-op when the product is not in the cart.
    pub fn remove_item(&mut self, product_id: ProductId) -> Result<()> {
        if self.line(product_id).is_none() { return Ok(()); }
        let lines = self.lines.iter().filter(|l| l.product_id != product_id).cloned().collect();
        self.commit(lines)
    }

    pub fn set_quantity(&mut self, product_id: ProductId, quantity: i64) -> Result<&CartLine> {
        let quantity = Quantity::new(quantity)?;
        let idx = self.lines.iter().position(|l| l.product_id == product_id).ok_or(StoreError::ProductNotFound(product_id))?;
        let mut lines = self.lines.clone();
        lines[idx].quantity = quantity;
        self.commit(lines)?;
        Ok(&self.lines[idx])
    }

    pub fn clear(&mut self) -> Result<()> {
        if let Some(store) = &self.store {
            store.remove(&self.session_id)?;
        }
        self.lines.clear();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn records(&self) -> Vec<CartLineRecord> { self.lines.iter().map(CartLine::to_record).collect() }

    pub fn view(&self) -> Result<Cart> {
        let total = self.total()?;
        Ok(Cart {
            session_id: self.session_id.clone(),
            lines: self.lines.clone(),
            line_count: self.line_count(),
            item_count: self.item_count(),
            total_display: total.display(),
            total,
            updated_at: self.updated_at,
        })
    }

    fn commit(&mut self, lines: Vec<CartLine>) -> Result<()> {
        sum_lines(&lines, &self.currency)?;
        if let Some(store) = &self.store {
            let records: Vec<_> = lines.iter().map(CartLine::to_record).collect();
            store.save(&self.session_id, &records)?;
        }
        self.lines = lines;
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn merge(lines: &mut Vec<CartLine>, product_id: ProductId, name: String, quantity: Quantity, unit_price: Money) -> Result<usize> {
    if let Some(idx) = lines.iter().position(|l| l.product_id == product_id) {
        lines[idx].quantity = lines[idx].quantity.add(quantity)?;
        return Ok(idx);
    }
    lines.push(CartLine { product_id, name, quantity, unit_price });
    Ok(lines.len() - 1)
}

fn sum_lines(lines: &[CartLine], currency: &str) -> Result<Money> {
    lines.iter().try_fold(Money::zero(currency), |total, line| total.add(&line.line_total()?))
}

impl fmt::Debug for CartLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartLedger")
            .field("session_id", &self.session_id)
            .field("lines", &self.lines)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}
