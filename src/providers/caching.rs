use crate::core::cache::Cache;
use crate::core::currency::{CurrencyRateProvider, RateTable};
use crate::core::price::{
    PriceMap, PriceQuote, QuoteProvider, SymbolMatch, SymbolSearchProvider, upstream_symbol,
};
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Quote lookups through a shared cache.
///
/// Never fails: symbols without a quote are simply absent from the result,
/// and cache errors only cost a cache miss.
pub struct PricingGateway {
    inner: Arc<dyn QuoteProvider>,
    cache: Arc<dyn Cache<String, PriceQuote>>,
    ttl: Duration,
}

impl PricingGateway {
    pub fn new(
        inner: Arc<dyn QuoteProvider>,
        cache: Arc<dyn Cache<String, PriceQuote>>,
        ttl: Duration,
    ) -> Self {
        Self { inner, cache, ttl }
    }

    pub async fn get_prices(&self, symbols: &[String]) -> PriceMap {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = symbols.iter().filter(|s| seen.insert(*s)).collect();
        if unique.is_empty() {
            return PriceMap::new();
        }

        let lookups = join_all(unique.iter().map(|symbol| async move {
            match self.cache.get(*symbol).await {
                Ok(hit) => (*symbol, hit),
                Err(e) => {
                    warn!("Price cache read failed for {}: {}", symbol, e);
                    (*symbol, None)
                }
            }
        }))
        .await;

        let mut prices = PriceMap::new();
        let mut misses = Vec::new();
        for (symbol, hit) in lookups {
            match hit {
                Some(quote) => {
                    prices.insert(symbol.clone(), quote);
                }
                None => misses.push(symbol.clone()),
            }
        }
        if misses.is_empty() {
            return prices;
        }

        // Upstream symbol -> every requested ticker that maps onto it
        let mut requested_as: HashMap<String, Vec<String>> = HashMap::new();
        for symbol in &misses {
            requested_as
                .entry(upstream_symbol(symbol))
                .or_default()
                .push(symbol.clone());
        }
        let upstream: Vec<String> = requested_as.keys().cloned().collect();
        debug!("Fetching {} quotes from upstream", upstream.len());

        let fetched = match self.inner.fetch_quotes(&upstream).await {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!("Quote fetch failed for {:?}: {}", upstream, e);
                PriceMap::new()
            }
        };

        let mut fresh = Vec::new();
        for (upstream_symbol, quote) in fetched {
            let Some(originals) = requested_as.get(&upstream_symbol) else {
                debug!("Ignoring unrequested quote for {}", upstream_symbol);
                continue;
            };
            for original in originals {
                fresh.push((original.clone(), quote.clone()));
            }
        }

        let writes = join_all(fresh.iter().map(|(symbol, quote)| async move {
            if let Err(e) = self
                .cache
                .put(symbol.clone(), quote.clone(), Some(self.ttl))
                .await
            {
                warn!("Price cache write failed for {}: {}", symbol, e);
            }
        }));
        writes.await;

        prices.extend(fresh);
        prices
    }
}

/// Rate tables cached per base currency. Fetch errors are returned, not
/// cached.
pub struct CachingCurrencyRateProvider<T: CurrencyRateProvider> {
    inner: T,
    cache: Arc<dyn Cache<String, RateTable>>,
    ttl: Duration,
}

impl<T: CurrencyRateProvider> CachingCurrencyRateProvider<T> {
    pub fn new(inner: T, cache: Arc<dyn Cache<String, RateTable>>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }
}

#[async_trait]
impl<T: CurrencyRateProvider> CurrencyRateProvider for CachingCurrencyRateProvider<T> {
    async fn fetch_rates(&self, base: &str) -> Result<RateTable> {
        let key = base.trim().to_lowercase();
        match self.cache.get(&key).await {
            Ok(Some(table)) => {
                debug!("Cache hit for currency rates: {}", key);
                return Ok(table);
            }
            Ok(None) => debug!("Cache miss for currency rates: {}", key),
            Err(e) => warn!("Rate cache read failed for {}: {}", key, e),
        }

        let table = self.inner.fetch_rates(&key).await?;
        if let Err(e) = self
            .cache
            .put(key.clone(), table.clone(), Some(self.ttl))
            .await
        {
            warn!("Rate cache write failed for {}: {}", key, e);
        }
        Ok(table)
    }
}

/// Symbol search results cached per `(query, type)`.
pub struct CachingSymbolSearch {
    inner: Arc<dyn SymbolSearchProvider>,
    cache: Arc<dyn Cache<String, Vec<SymbolMatch>>>,
    ttl: Duration,
}

impl CachingSymbolSearch {
    pub fn new(
        inner: Arc<dyn SymbolSearchProvider>,
        cache: Arc<dyn Cache<String, Vec<SymbolMatch>>>,
        ttl: Duration,
    ) -> Self {
        Self { inner, cache, ttl }
    }

    /// Searches without consulting or filling the cache.
    pub async fn search_direct(&self, query: &str, kind: Option<&str>) -> Result<Vec<SymbolMatch>> {
        self.inner.search(query, kind).await
    }
}

#[async_trait]
impl SymbolSearchProvider for CachingSymbolSearch {
    async fn search(&self, query: &str, kind: Option<&str>) -> Result<Vec<SymbolMatch>> {
        let key = format!(
            "{}:{}",
            query.trim().to_lowercase(),
            kind.unwrap_or_default().to_lowercase()
        );
        match self.cache.get(&key).await {
            Ok(Some(matches)) => return Ok(matches),
            Ok(None) => {}
            Err(e) => warn!("Search cache read failed for {}: {}", key, e),
        }

        let matches = self.inner.search(query, kind).await?;
        if let Err(e) = self.cache.put(key.clone(), matches.clone(), Some(self.ttl)).await {
            warn!("Search cache write failed for {}: {}", key, e);
        }
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::CacheError;
    use crate::store::memory::MemoryCache;
    use anyhow::anyhow;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockQuoteProvider {
        requests: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl QuoteProvider for MockQuoteProvider {
        async fn fetch_quotes(&self, symbols: &[String]) -> Result<PriceMap> {
            let mut sorted = symbols.to_vec();
            sorted.sort();
            self.requests.lock().unwrap().push(sorted);
            if self.fail {
                return Err(anyhow!("upstream down"));
            }
            Ok(symbols
                .iter()
                .filter_map(|s| {
                    let price = match s.as_str() {
                        "AAPL" => 150.0,
                        "BTC-USD" => 40000.0,
                        _ => return None,
                    };
                    Some((
                        s.clone(),
                        PriceQuote {
                            description: None,
                            currency: Some("USD".to_string()),
                            price: Some(price),
                            timestamp: Utc::now(),
                        },
                    ))
                })
                .collect())
        }
    }

    /// A cache whose backend is unreachable.
    struct BrokenCache;

    #[async_trait]
    impl<V: Send + Sync + 'static> Cache<String, V> for BrokenCache {
        async fn get(&self, _key: &String) -> Result<Option<V>, CacheError> {
            Err(CacheError::Storage("unavailable".to_string()))
        }
        async fn put(
            &self,
            _key: String,
            _value: V,
            _ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            Err(CacheError::Storage("unavailable".to_string()))
        }
        async fn remove(&self, _key: &String) -> Result<(), CacheError> {
            Err(CacheError::Storage("unavailable".to_string()))
        }
        async fn clear(&self) -> Result<(), CacheError> {
            Err(CacheError::Storage("unavailable".to_string()))
        }
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_misses_are_batched_and_cached() {
        let provider = Arc::new(MockQuoteProvider::default());
        let gateway = PricingGateway::new(
            provider.clone(),
            Arc::new(MemoryCache::new()),
            Duration::from_secs(3600),
        );

        let prices = gateway.get_prices(&symbols(&["AAPL", "BTC", "AAPL", "NOPE"])).await;
        assert_eq!(prices.len(), 2);
        assert_eq!(prices["AAPL"].price, Some(150.0));
        // Crypto tickers come back under the name they were requested with
        assert_eq!(prices["BTC"].price, Some(40000.0));
        assert!(!prices.contains_key("BTC-USD"));
        assert!(!prices.contains_key("NOPE"));
        assert_eq!(
            *provider.requests.lock().unwrap(),
            vec![symbols(&["AAPL", "BTC-USD", "NOPE"])]
        );

        // Cached symbols are not requested again
        let prices = gateway.get_prices(&symbols(&["AAPL", "BTC", "NOPE"])).await;
        assert_eq!(prices.len(), 2);
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1], symbols(&["NOPE"]));
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let provider = Arc::new(MockQuoteProvider::default());
        let gateway = PricingGateway::new(
            provider.clone(),
            Arc::new(MemoryCache::new()),
            Duration::from_millis(10),
        );

        gateway.get_prices(&symbols(&["AAPL"])).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        gateway.get_prices(&symbols(&["AAPL"])).await;
        assert_eq!(provider.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_yields_empty_map() {
        let provider = Arc::new(MockQuoteProvider {
            fail: true,
            ..Default::default()
        });
        let gateway =
            PricingGateway::new(provider, Arc::new(MemoryCache::new()), Duration::from_secs(60));
        let prices = gateway.get_prices(&symbols(&["AAPL"])).await;
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn test_broken_cache_falls_through_to_upstream() {
        let provider = Arc::new(MockQuoteProvider::default());
        let gateway = PricingGateway::new(
            provider.clone(),
            Arc::new(BrokenCache),
            Duration::from_secs(60),
        );

        let prices = gateway.get_prices(&symbols(&["AAPL"])).await;
        assert_eq!(prices["AAPL"].price, Some(150.0));
        let prices = gateway.get_prices(&symbols(&["AAPL"])).await;
        assert_eq!(prices["AAPL"].price, Some(150.0));
        assert_eq!(provider.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_symbols_no_request() {
        let provider = Arc::new(MockQuoteProvider::default());
        let gateway = PricingGateway::new(
            provider.clone(),
            Arc::new(MemoryCache::new()),
            Duration::from_secs(60),
        );
        assert!(gateway.get_prices(&[]).await.is_empty());
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    struct MockRateProvider {
        call_count: AtomicUsize,
    }

    #[async_trait]
    impl CurrencyRateProvider for MockRateProvider {
        async fn fetch_rates(&self, base: &str) -> Result<RateTable> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if base == "usd" {
                Ok(RateTable::new(base, HashMap::from([("eur".to_string(), 0.9)])))
            } else {
                Err(anyhow!("Unknown base"))
            }
        }
    }

    #[tokio::test]
    async fn test_caching_currency_rate_provider() {
        let inner = MockRateProvider {
            call_count: AtomicUsize::new(0),
        };
        let provider = CachingCurrencyRateProvider::new(
            inner,
            Arc::new(MemoryCache::new()),
            Duration::from_secs(60),
        );

        let table = provider.fetch_rates("USD").await.unwrap();
        assert_eq!(table.rate("eur"), Some(0.9));
        provider.fetch_rates("usd").await.unwrap();
        assert_eq!(provider.inner.call_count.load(Ordering::SeqCst), 1);

        // Failures propagate and are retried on the next call
        assert!(provider.fetch_rates("xyz").await.is_err());
        assert!(provider.fetch_rates("xyz").await.is_err());
        assert_eq!(provider.inner.call_count.load(Ordering::SeqCst), 3);
    }

    struct CountingSearch {
        call_count: AtomicUsize,
    }

    #[async_trait]
    impl SymbolSearchProvider for CountingSearch {
        async fn search(&self, query: &str, _kind: Option<&str>) -> Result<Vec<SymbolMatch>> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SymbolMatch {
                symbol: query.to_uppercase(),
                name: None,
                exchange: None,
                quote_type: None,
            }])
        }
    }

    #[tokio::test]
    async fn test_search_cache_and_direct_bypass() {
        let inner = Arc::new(CountingSearch {
            call_count: AtomicUsize::new(0),
        });
        let search = CachingSymbolSearch::new(
            inner.clone(),
            Arc::new(MemoryCache::new()),
            Duration::from_secs(60),
        );

        search.search("msft", Some("EQUITY")).await.unwrap();
        search.search("MSFT ", Some("equity")).await.unwrap();
        assert_eq!(inner.call_count.load(Ordering::SeqCst), 1);

        search.search("msft", None).await.unwrap();
        assert_eq!(inner.call_count.load(Ordering::SeqCst), 2);

        let direct = search.search_direct("msft", None).await.unwrap();
        assert_eq!(direct[0].symbol, "MSFT");
        assert_eq!(inner.call_count.load(Ordering::SeqCst), 3);
    }
}
