//! HTTP surface over the cart ledger, catalog and sales reports.

mod error;
mod handlers;

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::domain::aggregates::{CartLedger, Catalog};
use crate::domain::events::DomainEvent;
use crate::domain::reporting::{SaleRecord, SalesAggregator};
use crate::ingest::SalesIngestor;
use crate::persistence::{CartStore, JsonFileCartStore, MemoryCartStore};

/// Mutable storefront data. One lock guards all of it, so a checkout sees the
/// cart, stock and sales ledger change together.
pub struct Storefront {
    pub catalog: Catalog,
    pub sales: Vec<SaleRecord>,
    carts: HashMap<String, CartLedger>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn CartStore>,
    pub aggregator: SalesAggregator,
    pub ingestor: SalesIngestor,
    pub shop: Arc<Mutex<Storefront>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let catalog = if config.catalog_path.exists() {
            Catalog::load(&config.catalog_path, &config.currency)?
        } else {
            tracing::warn!(path = %config.catalog_path.display(), "catalog file not found, starting with an empty catalog");
            Catalog::new(vec![], &config.currency)
        };
        let store: Arc<dyn CartStore> = match &config.cart_store_dir {
            Some(dir) => Arc::new(JsonFileCartStore::open(dir)?),
            None => Arc::new(MemoryCartStore::new()),
        };
        Ok(Self::from_parts(config, catalog, store))
    }

    pub fn from_parts(config: Config, catalog: Catalog, store: Arc<dyn CartStore>) -> Self {
        tracing::info!(products = catalog.len(), pricing = ?config.pricing, policy = ?config.malformed_policy, "storefront ready");
        Self {
            aggregator: SalesAggregator::new(config.report_offset),
            ingestor: SalesIngestor::new(config.malformed_policy, config.report_offset),
            config: Arc::new(config),
            store,
            shop: Arc::new(Mutex::new(Storefront { catalog, sales: vec![], carts: HashMap::new() })),
        }
    }
}

impl Storefront {
    /// Fails when appending `records` would push the sales ledger past what
    /// a report can total.
    fn ensure_bookable(&self, records: &[SaleRecord]) -> crate::Result<()> {
        SalesAggregator::ensure_reportable(self.sales.iter().chain(records))
    }

    fn book_sales(&mut self, records: Vec<SaleRecord>) -> crate::Result<()> {
        self.ensure_bookable(&records)?;
        self.sales.extend(records);
        Ok(())
    }

    /// The session's ledger, restored from the cart store on first use.
    fn cart(&mut self, session: &str, state: &AppState) -> crate::Result<&mut CartLedger> {
        match self.carts.entry(session.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let ledger = CartLedger::open(session, state.store.clone(), &state.config.currency, state.config.pricing)?;
                tracing::debug!(session, lines = ledger.line_count(), "cart opened");
                Ok(e.insert(ledger))
            }
        }
    }
}

fn log_events(events: Vec<DomainEvent>) {
    for event in events {
        tracing::info!(?event, "domain event");
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "gamestore-commerce"})) }))
        .route("/api/v1/products", get(handlers::list_products).post(handlers::create_product))
        .route("/api/v1/products/:id", get(handlers::get_product).put(handlers::update_product))
        .route("/api/v1/products/:id/stock", put(handlers::update_stock))
        .route("/api/v1/cart/:session", get(handlers::get_cart).post(handlers::add_to_cart).delete(handlers::clear_cart))
        .route("/api/v1/cart/:session/items/:product_id", put(handlers::set_quantity).delete(handlers::remove_item))
        .route("/api/v1/checkout/:session", post(handlers::checkout))
        .route("/api/v1/sales", get(handlers::list_sales).post(handlers::record_sale))
        .route("/api/v1/sales/import", post(handlers::import_sales))
        .route("/api/v1/sales/report", get(handlers::sales_report))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
