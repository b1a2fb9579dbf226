//! Core business logic abstractions

pub mod allocation;
pub mod analytics;
pub mod cache;
pub mod config;
pub mod currency;
pub mod log;
pub mod models;
pub mod price;
pub mod telemetry;
pub mod valuation;

// Re-export main types for cleaner imports
pub use allocation::{AssetCategory, DisplayGroup};
pub use cache::{Cache, CacheError};
pub use currency::{CurrencyRateProvider, RateTable};
pub use price::{PriceMap, PriceQuote, QuoteProvider, SymbolMatch, SymbolSearchProvider};
