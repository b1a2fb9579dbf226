//! REST API over the store, the pricing gateway and the rate cache.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;

use crate::core::cache::Cache;
use crate::core::config::{AppConfig, CacheBackend};
use crate::core::currency::{CurrencyRateProvider, RateTable};
use crate::core::price::{PriceQuote, QuoteProvider, SymbolMatch, SymbolSearchProvider};
use crate::core::telemetry::RecentErrorFilter;
use crate::providers::caching::{CachingCurrencyRateProvider, CachingSymbolSearch, PricingGateway};
use crate::providers::currency_api::CurrencyApiProvider;
use crate::providers::yahoo_finance::YahooFinanceProvider;
use crate::store::Store;
use crate::store::memory::MemoryCache;
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, put};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Everything a handler needs, built once per process.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<Store>,
    pub pricing: PricingGateway,
    pub rates: Arc<dyn CurrencyRateProvider>,
    pub search: CachingSymbolSearch,
    pub recent_errors: RecentErrorFilter,
}

impl AppState {
    /// Wires the providers behind their caches. Quote and search caches
    /// follow `cache.backend`; rate tables are always held in memory.
    pub fn new<R>(
        config: AppConfig,
        store: Arc<Store>,
        quotes: Arc<dyn QuoteProvider>,
        rates: R,
        search: Arc<dyn SymbolSearchProvider>,
    ) -> Result<Self>
    where
        R: CurrencyRateProvider + 'static,
    {
        let (quote_cache, search_cache): (
            Arc<dyn Cache<String, PriceQuote>>,
            Arc<dyn Cache<String, Vec<SymbolMatch>>>,
        ) = match config.cache.backend {
            CacheBackend::Disk => (
                Arc::new(store.cache::<String, PriceQuote>("price_cache")?),
                Arc::new(store.cache::<String, Vec<SymbolMatch>>("search_cache")?),
            ),
            CacheBackend::Memory => (
                Arc::new(MemoryCache::<String, PriceQuote>::new()),
                Arc::new(MemoryCache::<String, Vec<SymbolMatch>>::new()),
            ),
        };
        let rate_cache: Arc<dyn Cache<String, RateTable>> =
            Arc::new(MemoryCache::<String, RateTable>::new());

        Ok(Self {
            pricing: PricingGateway::new(quotes, quote_cache, config.cache.quote_ttl()),
            rates: Arc::new(CachingCurrencyRateProvider::new(
                rates,
                rate_cache,
                config.cache.rates_ttl(),
            )),
            search: CachingSymbolSearch::new(search, search_cache, config.cache.search_ttl()),
            recent_errors: RecentErrorFilter::new(config.log_dedup_window()),
            store,
            config,
        })
    }

    /// Opens the store at the configured data path and connects the
    /// configured HTTP providers.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let data_path = config.default_data_path()?;
        let store = Arc::new(Store::open(&data_path)?);
        let yahoo = Arc::new(YahooFinanceProvider::new(config.providers.yahoo_url()));
        let rates = CurrencyApiProvider::new(config.providers.currency_url());
        Self::new(config, store, yahoo.clone(), rates, yahoo)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    use handlers::{assets, investments, logs, market, summary, users};

    Router::new()
        .route("/api/asset", get(assets::list_assets).post(assets::create_asset))
        .route(
            "/api/asset/:id",
            get(assets::get_asset)
                .patch(assets::update_asset)
                .delete(assets::delete_asset),
        )
        .route(
            "/api/investment",
            get(investments::list_investments).post(investments::create_investment),
        )
        .route(
            "/api/investment/:id",
            get(investments::get_investment)
                .put(investments::update_investment)
                .delete(investments::delete_investment),
        )
        .route(
            "/api/investment/:id/transactions",
            get(investments::list_transactions).post(investments::add_transaction),
        )
        .route(
            "/api/investment/:id/transactions/:transaction_id",
            put(investments::update_transaction).delete(investments::delete_transaction),
        )
        .route(
            "/api/investment/:id/performance",
            get(investments::get_performance),
        )
        .route("/api/symbols/search", get(market::search_symbols))
        .route("/api/symbols/search/direct", get(market::search_symbols_direct))
        .route("/api/rates", get(market::get_rates))
        .route("/api/summary", get(summary::get_summary))
        .route("/api/logs", get(logs::list_logs).post(logs::create_log))
        .route("/api/users", get(users::list_users))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API until Ctrl-C, then flushes the store.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let address = state.config.server.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {address}"))?;
    info!("Listening on http://{}", address);

    let store = state.store.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    store.persist()
}
