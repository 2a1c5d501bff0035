use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{log_events, AppState};
use crate::domain::aggregates::{Cart, CheckoutRequest, NewProduct, Order, PaymentRequest, Product, ProductUpdate};
use crate::domain::reporting::{SaleRecord, SalesReport};
use crate::domain::value_objects::{ProductId, Quantity};
use crate::ingest::Rejection;
use crate::StoreError;

type ApiResult<T> = Result<T, StoreError>;

#[derive(Debug, Deserialize)] pub struct SearchParams { pub search: Option<String> }
#[derive(Debug, Deserialize)] pub struct StockUpdate { pub stock: i64 }
#[derive(Debug, Deserialize)] #[serde(rename_all = "camelCase")] pub struct AddToCartRequest { pub product_id: ProductId, pub quantity: Option<i64> }
#[derive(Debug, Deserialize)] pub struct SetQuantityRequest { pub quantity: i64 }
#[derive(Debug, Deserialize)] #[serde(rename_all = "camelCase")] pub struct RecordSaleRequest { pub product_id: ProductId, pub quantity: i64 }
#[derive(Debug, Serialize)] pub struct CheckoutResponse { pub order: Order, pub payment: PaymentRequest }
#[derive(Debug, Serialize)] pub struct ImportResponse { pub accepted: usize, pub rejected: Vec<Rejection> }

pub async fn list_products(State(s): State<AppState>, Query(p): Query<SearchParams>) -> Json<Vec<Product>> {
    let shop = s.shop.lock().await;
    Json(shop.catalog.search(p.search.as_deref().unwrap_or_default()).into_iter().cloned().collect())
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<u64>) -> ApiResult<Json<Product>> {
    let shop = s.shop.lock().await;
    Ok(Json(shop.catalog.get(ProductId::new(id))?.clone()))
}

pub async fn create_product(State(s): State<AppState>, Json(r): Json<NewProduct>) -> ApiResult<(StatusCode, Json<Product>)> {
    let mut shop = s.shop.lock().await;
    let product = shop.catalog.add(r)?.clone();
    log_events(shop.catalog.take_events());
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(State(s): State<AppState>, Path(id): Path<u64>, Json(r): Json<ProductUpdate>) -> ApiResult<Json<Product>> {
    let mut shop = s.shop.lock().await;
    let product = shop.catalog.update(ProductId::new(id), r)?.clone();
    log_events(shop.catalog.take_events());
    Ok(Json(product))
}

pub async fn update_stock(State(s): State<AppState>, Path(id): Path<u64>, Json(r): Json<StockUpdate>) -> ApiResult<Json<Product>> {
    let mut shop = s.shop.lock().await;
    let product = shop.catalog.set_stock(ProductId::new(id), r.stock)?.clone();
    log_events(shop.catalog.take_events());
    Ok(Json(product))
}

pub async fn get_cart(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<Json<Cart>> {
    let mut shop = s.shop.lock().await;
    Ok(Json(shop.cart(&session, &s)?.view()?))
}

pub async fn add_to_cart(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<AddToCartRequest>) -> ApiResult<(StatusCode, Json<Cart>)> {
    let mut shop = s.shop.lock().await;
    let product = shop.catalog.get(r.product_id)?.clone();
    let cart = shop.cart(&session, &s)?;
    let quantity = r.quantity.unwrap_or(1);
    cart.add_item(&product, quantity)?;
    tracing::debug!(%session, product_id = %r.product_id, quantity, "added to cart");
    Ok((StatusCode::CREATED, Json(cart.view()?)))
}

pub async fn set_quantity(State(s): State<AppState>, Path((session, product_id)): Path<(String, u64)>, Json(r): Json<SetQuantityRequest>) -> ApiResult<Json<Cart>> {
    let mut shop = s.shop.lock().await;
    let cart = shop.cart(&session, &s)?;
    cart.set_quantity(ProductId::new(product_id), r.quantity)?;
    Ok(Json(cart.view()?))
}

pub async fn remove_item(State(s): State<AppState>, Path((session, product_id)): Path<(String, u64)>) -> ApiResult<Json<Cart>> {
    let mut shop = s.shop.lock().await;
    let cart = shop.cart(&session, &s)?;
    cart.remove_item(ProductId::new(product_id))?;
    tracing::debug!(%session, product_id, "removed from cart");
    Ok(Json(cart.view()?))
}

pub async fn clear_cart(State(s): State<AppState>, Path(session): Path<String>) -> ApiResult<StatusCode> {
    let mut shop = s.shop.lock().await;
    shop.cart(&session, &s)?.clear()?;
    Ok(StatusCode::NO_CONTENT)
}

/// Places the order, takes the stock, books the sales and empties the cart.
/// The payment push itself is sent by the caller with the returned payload.
///
/// Everything is checked before the cart is cleared, and clearing is the only
/// step that writes to the cart store, so a failed checkout changes nothing.
pub async fn checkout(State(s): State<AppState>, Path(session): Path<String>, Json(r): Json<CheckoutRequest>) -> ApiResult<(StatusCode, Json<CheckoutResponse>)> {
    let mut shop = s.shop.lock().await;
    let mut order = Order::place(shop.cart(&session, &s)?, &r)?;
    let stock = order.stock_lines();
    let sales = order.sale_records();
    shop.catalog.ensure_stock(&stock)?;
    shop.ensure_bookable(&sales)?;

    shop.cart(&session, &s)?.clear()?;
    shop.catalog.deduct_stock(&stock)?;
    shop.book_sales(sales)?;
    let payment = order.request_payment();

    tracing::info!(%session, order_id = order.id(), total = %order.total(), "checkout completed");
    log_events(order.take_events());
    log_events(shop.catalog.take_events());
    Ok((StatusCode::CREATED, Json(CheckoutResponse { order, payment })))
}

pub async fn list_sales(State(s): State<AppState>) -> Json<Vec<SaleRecord>> {
    Json(s.shop.lock().await.sales.clone())
}

/// Manual sale entry from the admin sales page; revenue is the canonical
/// price times the quantity.
pub async fn record_sale(State(s): State<AppState>, Json(r): Json<RecordSaleRequest>) -> ApiResult<(StatusCode, Json<SaleRecord>)> {
    let quantity = Quantity::new(r.quantity)?;
    let mut shop = s.shop.lock().await;
    let product = shop.catalog.get(r.product_id)?;
    let record = SaleRecord {
        product_id: Some(product.id()),
        product_name: product.name().to_string(),
        quantity: quantity.value(),
        revenue: product.unit_price(s.config.pricing, &s.config.currency).multiply(quantity.value())?.amount(),
        timestamp: chrono::Utc::now(),
    };
    let lines = [(r.product_id, quantity)];
    shop.catalog.ensure_stock(&lines)?;
    shop.book_sales(vec![record.clone()])?;
    shop.catalog.deduct_stock(&lines)?;
    tracing::info!(product_id = %r.product_id, quantity = quantity.value(), revenue = %record.revenue, "sale recorded");
    log_events(shop.catalog.take_events());
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn import_sales(State(s): State<AppState>, Json(raw): Json<Vec<Value>>) -> ApiResult<Json<ImportResponse>> {
    let outcome = s.ingestor.ingest(&raw)?;
    let accepted = outcome.records.len();
    s.shop.lock().await.book_sales(outcome.records)?;
    tracing::info!(accepted, rejected = outcome.rejected.len(), "sales feed imported");
    Ok(Json(ImportResponse { accepted, rejected: outcome.rejected }))
}

pub async fn sales_report(State(s): State<AppState>) -> ApiResult<Json<SalesReport>> {
    let shop = s.shop.lock().await;
    Ok(Json(s.aggregator.build_report(&shop.sales)?))
}
