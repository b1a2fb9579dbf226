pub mod caching;
pub mod currency_api;
pub mod yahoo_finance;
