//! Product Aggregate and the catalog that owns it

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Money, PricingField, ProductId, Quantity};
use crate::{Result, StoreError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: ProductId,
    name: String,
    #[serde(default)]
    description: String,
    price: Decimal,
    #[serde(default)]
    actual_price: Option<Decimal>,
    #[serde(default)]
    stock: u32,
    #[serde(default, alias = "imageFile")]
    image: Option<String>,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, price: Decimal) -> Self {
        Self { id, name: name.into(), description: String::new(), price, actual_price: None, stock: 0, image: None }
    }

    pub fn with_actual_price(mut self, actual_price: Decimal) -> Self { self.actual_price = Some(actual_price); self }
    pub fn with_stock(mut self, stock: u32) -> Self { self.stock = stock; self }

    pub fn id(&self) -> ProductId { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }
    pub fn price(&self) -> Decimal { self.price }
    pub fn actual_price(&self) -> Option<Decimal> { self.actual_price }
    pub fn stock(&self) -> u32 { self.stock }
    pub fn image(&self) -> Option<&str> { self.image.as_deref() }
    pub fn is_in_stock(&self) -> bool { self.stock > 0 }

    /// Unit price under the deployment's pricing field. A product without a
    /// discounted price charges its list price.
    pub fn unit_price(&self, field: PricingField, currency: &str) -> Money {
        let amount = match field {
            PricingField::Price => self.price,
            PricingField::ActualPrice => self.actual_price.unwrap_or(self.price),
        };
        Money::new(amount, currency)
    }

    fn matches(&self, term: &str) -> bool { self.name.to_lowercase().contains(term) }
}

fn non_negative(amount: &Decimal) -> std::result::Result<(), ValidationError> {
    if amount.is_sign_negative() { return Err(ValidationError::new("negative_amount")); }
    Ok(())
}

/// Admin input for a new catalog entry; the id is assigned by the catalog.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom = "non_negative")]
    pub price: Decimal,
    #[validate(custom = "non_negative")]
    pub actual_price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub stock: i64,
    pub image: Option<String>,
}

/// Partial edit; absent fields keep their value.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "non_negative")]
    pub price: Option<Decimal>,
    #[validate(custom = "non_negative")]
    pub actual_price: Option<Decimal>,
    pub image: Option<String>,
}

/// Read-mostly product reference data with admin edits.
#[derive(Clone, Debug)]
pub struct Catalog {
    products: Vec<Product>,
    currency: String,
    events: Vec<DomainEvent>,
}

impl Catalog {
    pub fn new(products: Vec<Product>, currency: &str) -> Self {
        Self { products, currency: currency.to_string(), events: vec![] }
    }

    pub fn from_json(json: &str, currency: &str) -> Result<Self> {
        let products: Vec<Product> = serde_json::from_str(json)?;
        Ok(Self::new(products, currency))
    }

    pub fn load(path: impl AsRef<Path>, currency: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw, currency)
    }

    pub fn currency(&self) -> &str { &self.currency }
    pub fn products(&self) -> &[Product] { &self.products }
    pub fn len(&self) -> usize { self.products.len() }
    pub fn is_empty(&self) -> bool { self.products.is_empty() }

    /// Case-insensitive substring match on the product name; a blank term
    /// returns the whole catalog.
    pub fn search(&self, term: &str) -> Vec<&Product> {
        let term = term.trim().to_lowercase();
        self.products.iter().filter(|p| p.matches(&term)).collect()
    }

    pub fn get(&self, id: ProductId) -> Result<&Product> {
        self.products.iter().find(|p| p.id == id).ok_or(StoreError::ProductNotFound(id))
    }

    fn get_mut(&mut self, id: ProductId) -> Result<&mut Product> {
        self.products.iter_mut().find(|p| p.id == id).ok_or(StoreError::ProductNotFound(id))
    }

    pub fn unit_price(&self, id: ProductId, field: PricingField) -> Result<Money> {
        Ok(self.get(id)?.unit_price(field, &self.currency))
    }

    pub fn add(&mut self, input: NewProduct) -> Result<&Product> {
        input.validate()?;
        let stock = u32::try_from(input.stock).map_err(|_| StoreError::InvalidStock(input.stock))?;
        let id = match self.products.iter().map(|p| p.id).max() {
            Some(max) => max.next().ok_or_else(ids_exhausted)?,
            None => ProductId::new(1),
        };
        self.products.push(Product {
            id, name: input.name, description: input.description, price: input.price,
            actual_price: input.actual_price, stock, image: input.image,
        });
        let product = &self.products[self.products.len() - 1];
        self.events.push(DomainEvent::Product(ProductEvent::Created { product_id: id, name: product.name.clone() }));
        Ok(product)
    }

    pub fn update(&mut self, id: ProductId, changes: ProductUpdate) -> Result<&Product> {
        changes.validate()?;
        let product = self.get_mut(id)?;
        if let Some(name) = changes.name { product.name = name; }
        if let Some(description) = changes.description { product.description = description; }
        if let Some(price) = changes.price { product.price = price; }
        if let Some(actual_price) = changes.actual_price { product.actual_price = Some(actual_price); }
        if let Some(image) = changes.image { product.image = Some(image); }
        self.events.push(DomainEvent::Product(ProductEvent::Updated { product_id: id }));
        self.get(id)
    }

    pub fn set_stock(&mut self, id: ProductId, stock: i64) -> Result<&Product> {
        let stock = u32::try_from(stock).map_err(|_| StoreError::InvalidStock(stock))?;
        self.get_mut(id)?.stock = stock;
        self.events.push(DomainEvent::Product(ProductEvent::StockSet { product_id: id, stock }));
        self.get(id)
    }

    /// Fails on the first line the catalog cannot cover.
    pub fn ensure_stock(&self, lines: &[(ProductId, Quantity)]) -> Result<()> {
        for (id, qty) in lines {
            let product = self.get(*id)?;
            if product.stock < qty.value() {
                return Err(StoreError::InsufficientInventory { product_id: *id, requested: qty.value(), available: product.stock });
            }
        }
        Ok(())
    }

    /// Checks every line before touching any stock so a failed order leaves
    /// the catalog unchanged.
    pub fn deduct_stock(&mut self, lines: &[(ProductId, Quantity)]) -> Result<()> {
        self.ensure_stock(lines)?;
        for (id, qty) in lines {
            let product = self.get_mut(*id)?;
            product.stock -= qty.value();
            let remaining = product.stock;
            self.events.push(DomainEvent::Product(ProductEvent::StockDeducted { product_id: *id, quantity: qty.value(), remaining }));
        }
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
}

fn ids_exhausted() -> StoreError {
    let mut errors = ValidationErrors::new();
    errors.add("id", ValidationError::new("ids_exhausted"));
    StoreError::Validation(errors)
}
