//! Public facade over the cache tiers and the provider chain.
//!
//! One resolver instance owns both cache tiers and is shared by reference
//! across request handlers; refresh is always triggered lazily by a caller
//! that observes staleness, never by a background task. Provider failures
//! never escape this layer: `get_rates` degrades to the configured fallback
//! table, `convert` signals unconvertible pairs as NaN, and history lookups
//! report `None`.

use crate::cache::{SlotCache, TtlCache};
use crate::config::EngineConfig;
use crate::fetch::{HttpFetcher, WireFetch};
use crate::providers::{ExchangeHostProvider, FrankfurterProvider, ProviderChain};
use crate::rates::{DayQuery, DayRates, RangeQuery, RateSeries, RateSnapshot, round2};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct CurrencyResolver {
    base: String,
    symbols: Vec<String>,
    fallback_rates: HashMap<String, f64>,
    chain: ProviderChain,
    latest: SlotCache<Arc<RateSnapshot>>,
    day_cache: TtlCache<DayQuery, DayRates>,
    range_cache: TtlCache<RangeQuery, RateSeries>,
}

impl CurrencyResolver {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let fetcher: Arc<dyn WireFetch> = Arc::new(HttpFetcher::new()?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Builds a resolver over an externally supplied fetcher.
    pub fn with_fetcher(config: &EngineConfig, fetcher: Arc<dyn WireFetch>) -> Self {
        let primary = ExchangeHostProvider::new(config.primary_base_url(), Arc::clone(&fetcher));
        let secondary = FrankfurterProvider::new(config.secondary_base_url(), fetcher);
        CurrencyResolver {
            base: config.base_currency.to_uppercase(),
            symbols: config.symbols.clone(),
            fallback_rates: config.fallback_rates.clone(),
            chain: ProviderChain::new(primary, secondary),
            latest: SlotCache::new(config.latest_ttl()),
            day_cache: TtlCache::new(config.history_ttl()),
            range_cache: TtlCache::new(config.history_ttl()),
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.base
    }

    /// Latest rates relative to the configured base. Total: a provider
    /// outage yields the configured fallback snapshot, stamped as fetched
    /// now, rather than an error.
    pub async fn get_rates(&self) -> Arc<RateSnapshot> {
        if let Some(snapshot) = self.latest.fresh() {
            debug!("Latest rates returned from cache");
            return snapshot;
        }

        let _guard = self.latest.refresh_guard().await;
        if let Some(snapshot) = self.latest.fresh() {
            // a racing refresher beat us to it
            return snapshot;
        }

        let snapshot = match self.chain.latest(&self.base, &self.symbols).await {
            Some(rates) => {
                let snapshot = Arc::new(RateSnapshot::new(&self.base, rates));
                info!(
                    "Latest rates updated: base={}, currencies={}",
                    snapshot.base,
                    snapshot.rates.len()
                );
                snapshot
            }
            None => {
                warn!("Using fallback rates (stub data)");
                Arc::new(RateSnapshot::new(&self.base, self.fallback_rates.clone()))
            }
        };
        self.latest.store(Arc::clone(&snapshot));
        snapshot
    }

    /// Converts `amount` between two currency codes, pivoting through the
    /// base currency. With a parsable `date`, historical rates are
    /// substituted when they cover both codes; otherwise the latest
    /// snapshot applies. Returns NaN for unknown codes or a zero base
    /// rate; callers must check before use.
    pub async fn convert(&self, from: &str, to: &str, amount: f64, date: Option<&str>) -> f64 {
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();
        if from.is_empty() || to.is_empty() {
            return f64::NAN;
        }

        let mut table = self.base_table().await;

        if let Some(date) = date.map(str::trim).filter(|d| !d.is_empty()) {
            let base = self.base.clone();
            if let Some(hist) = self
                .history_on_date(&base, &[from.as_str(), to.as_str()], date)
                .await
            {
                if hist.contains_key(&from) && hist.contains_key(&to) {
                    table = hist;
                    table.insert(self.base.clone(), 1.0);
                }
            }
        }

        let (Some(rate_from), Some(rate_to)) = (table.get(&from).copied(), table.get(&to).copied())
        else {
            return f64::NAN;
        };
        if rate_from == 0.0 {
            return f64::NAN;
        }

        let rate = if from == self.base {
            rate_to
        } else if to == self.base {
            1.0 / rate_from
        } else {
            rate_to / rate_from
        };
        amount * rate
    }

    /// Latest rates rebased onto an arbitrary base currency, 2-decimal
    /// rounded. Unknown symbols are skipped, as is a base with no known or
    /// zero rate.
    pub async fn rates_for(&self, base: &str, symbols: &[&str]) -> DayRates {
        let base = base.trim().to_uppercase();
        let table = self.base_table().await;

        let mut result = DayRates::new();
        for symbol in symbols {
            let symbol = symbol.trim().to_uppercase();
            let Some(rate) = table.get(&symbol).copied() else {
                continue;
            };
            let rebased = if base == self.base {
                rate
            } else {
                match table.get(&base).copied() {
                    Some(base_rate) if base_rate != 0.0 => rate / base_rate,
                    _ => continue,
                }
            };
            result.insert(symbol, round2(rebased));
        }
        result
    }

    /// Historical rates for one calendar date. Primary provider only: an
    /// unparsable date or a provider failure reports `None`, with no
    /// fallback beyond the history cache.
    pub async fn history_on_date(
        &self,
        base: &str,
        symbols: &[&str],
        date: &str,
    ) -> Option<DayRates> {
        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
        let base = base.trim().to_uppercase();
        let symbols: Vec<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();

        let key = DayQuery {
            base: base.clone(),
            symbols: symbols.clone(),
            date,
        };
        if let Some(cached) = self.day_cache.get(&key).await {
            return Some(cached);
        }

        match self.chain.on_date(&base, &symbols, date).await {
            Some(rates) => {
                self.day_cache.put(key, rates.clone()).await;
                Some(rates)
            }
            None => {
                warn!("Failed to fetch currency history: date={}", date);
                None
            }
        }
    }

    /// Historical rates for one symbol over an inclusive date range,
    /// resolved through the full provider chain. Bounds are sanitized
    /// before querying; see [`sanitize_range`].
    #[instrument(name = "HistoryRange", skip(self))]
    pub async fn history_range(
        &self,
        base: &str,
        symbol: &str,
        from: &str,
        to: &str,
    ) -> Option<RateSeries> {
        let (start, end) = sanitize_range(from, to)?;
        let base = base.trim().to_uppercase();
        let symbol = symbol.trim().to_uppercase();

        let key = RangeQuery {
            base: base.clone(),
            symbol: symbol.clone(),
            start,
            end,
        };
        if let Some(cached) = self.range_cache.get(&key).await {
            return Some(cached);
        }

        match self.chain.range(&base, &symbol, start, end).await {
            Some(series) => {
                self.range_cache.put(key, series.clone()).await;
                Some(series)
            }
            None => {
                warn!("Failed to fetch history range: {}..{}", start, end);
                None
            }
        }
    }

    async fn base_table(&self) -> HashMap<String, f64> {
        let snapshot = self.get_rates().await;
        let mut table = snapshot.rates.clone();
        table.insert(snapshot.base.clone(), 1.0);
        table
    }
}

/// Parses and normalizes a requested date range: an unparsable bound is
/// treated as absent (the range cannot run), reversed bounds are swapped,
/// and bounds past today are clamped to today.
fn sanitize_range(from: &str, to: &str) -> Option<(NaiveDate, NaiveDate)> {
    let mut start = NaiveDate::parse_from_str(from.trim(), "%Y-%m-%d").ok()?;
    let mut end = NaiveDate::parse_from_str(to.trim(), "%Y-%m-%d").ok()?;
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }
    let today = Utc::now().date_naive();
    if end > today {
        end = today;
    }
    if start > today {
        start = today;
    }
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, PrimaryProviderConfig};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LATEST_BODY: &str = r#"{"base":"MDL","rates":{"USD":0.056,"EUR":0.052,"RUB":5.13}}"#;

    /// Serves canned bodies by URL substring; everything else fails.
    struct StubFetcher {
        responses: Vec<(&'static str, &'static str)>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn new(responses: Vec<(&'static str, &'static str)>) -> Arc<Self> {
            Arc::new(StubFetcher {
                responses,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl WireFetch for StubFetcher {
        async fn fetch(&self, url: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for (pattern, body) in &self.responses {
                if url.contains(pattern) {
                    return Ok((*body).to_string());
                }
            }
            Err(anyhow!("HTTP error: 500 for URL: {url}"))
        }
    }

    fn resolver(fetcher: Arc<StubFetcher>) -> CurrencyResolver {
        CurrencyResolver::with_fetcher(&EngineConfig::default(), fetcher)
    }

    #[tokio::test]
    async fn test_get_rates_caches_within_ttl() {
        let fetcher = StubFetcher::new(vec![("/latest", LATEST_BODY)]);
        let resolver = resolver(fetcher.clone());

        let first = resolver.get_rates().await;
        let second = resolver.get_rates().await;

        assert_eq!(first.rates.get("USD"), Some(&0.056));
        assert_eq!(second.rates.get("USD"), Some(&0.056));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_rates_refetches_when_stale() {
        let fetcher = StubFetcher::new(vec![("/latest", LATEST_BODY)]);
        let mut config = EngineConfig::default();
        config.latest_ttl_secs = 0;
        let resolver = CurrencyResolver::with_fetcher(&config, fetcher.clone());

        resolver.get_rates().await;
        resolver.get_rates().await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_get_rates_falls_back_to_stub() {
        let fetcher = StubFetcher::new(vec![]);
        let resolver = resolver(fetcher.clone());

        let snapshot = resolver.get_rates().await;
        assert_eq!(snapshot.base, "MDL");
        assert_eq!(snapshot.rates.get("USD"), Some(&0.057));
        assert_eq!(snapshot.rates.get("EUR"), Some(&0.053));
        assert_eq!(snapshot.rates.get("RUB"), Some(&5.2));

        // The fallback snapshot is cached like a fetched one.
        resolver.get_rates().await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_convert_from_base() {
        let fetcher = StubFetcher::new(vec![("/latest", LATEST_BODY)]);
        let resolver = resolver(fetcher);

        let result = resolver.convert("MDL", "USD", 100.0, None).await;
        assert!((result - 5.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_convert_to_base() {
        let fetcher = StubFetcher::new(vec![("/latest", LATEST_BODY)]);
        let resolver = resolver(fetcher);

        let result = resolver.convert("USD", "MDL", 5.6, None).await;
        assert!((result - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_convert_cross_pivot() {
        let fetcher = StubFetcher::new(vec![("/latest", LATEST_BODY)]);
        let resolver = resolver(fetcher);

        // USD -> EUR via the MDL pivot: 0.052 / 0.056
        let result = resolver.convert("usd", "eur", 100.0, None).await;
        assert!((result - 100.0 * 0.052 / 0.056).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_convert_identity() {
        let fetcher = StubFetcher::new(vec![("/latest", LATEST_BODY)]);
        let resolver = resolver(fetcher);

        let result = resolver.convert("EUR", "EUR", 42.5, None).await;
        assert!((result - 42.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_convert_inverse_round_trip() {
        let fetcher = StubFetcher::new(vec![("/latest", LATEST_BODY)]);
        let resolver = resolver(fetcher);

        let forward = resolver.convert("USD", "RUB", 250.0, None).await;
        let back = resolver.convert("RUB", "USD", forward, None).await;
        assert!((round2(back) - 250.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_convert_unknown_code_is_nan() {
        let fetcher = StubFetcher::new(vec![("/latest", LATEST_BODY)]);
        let resolver = resolver(fetcher);

        assert!(resolver.convert("USD", "XYZ", 10.0, None).await.is_nan());
        assert!(resolver.convert("", "USD", 10.0, None).await.is_nan());
    }

    #[tokio::test]
    async fn test_convert_zero_from_rate_is_nan() {
        let fetcher = StubFetcher::new(vec![(
            "/latest",
            r#"{"rates":{"USD":0.056,"XPD":0.0}}"#,
        )]);
        let resolver = resolver(fetcher);

        assert!(resolver.convert("XPD", "USD", 10.0, None).await.is_nan());
    }

    #[tokio::test]
    async fn test_convert_with_historical_date() {
        let fetcher = StubFetcher::new(vec![
            ("/latest", LATEST_BODY),
            ("/2024-02-01?", r#"{"rates":{"USD":0.050,"EUR":0.045}}"#),
        ]);
        let resolver = resolver(fetcher);

        let result = resolver
            .convert("USD", "EUR", 100.0, Some("2024-02-01"))
            .await;
        assert!((result - 100.0 * 0.045 / 0.050).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_convert_falls_back_to_latest_when_history_incomplete() {
        // Historical rates cover USD only, so the latest snapshot applies.
        let fetcher = StubFetcher::new(vec![
            ("/latest", LATEST_BODY),
            ("/2024-02-01?", r#"{"rates":{"USD":0.050}}"#),
        ]);
        let resolver = resolver(fetcher);

        let result = resolver
            .convert("USD", "EUR", 100.0, Some("2024-02-01"))
            .await;
        assert!((result - 100.0 * 0.052 / 0.056).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_convert_unparsable_date_uses_latest() {
        let fetcher = StubFetcher::new(vec![("/latest", LATEST_BODY)]);
        let resolver = resolver(fetcher.clone());

        let result = resolver
            .convert("USD", "EUR", 100.0, Some("not-a-date"))
            .await;
        assert!((result - 100.0 * 0.052 / 0.056).abs() < 1e-9);
        // only the latest endpoint was hit
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rates_for_rebases_and_rounds() {
        let fetcher = StubFetcher::new(vec![("/latest", LATEST_BODY)]);
        let resolver = resolver(fetcher);

        let rates = resolver.rates_for("USD", &["EUR", "MDL", "XYZ"]).await;
        assert_eq!(rates.len(), 2);
        assert_eq!(rates.get("EUR"), Some(&round2(0.052 / 0.056)));
        assert_eq!(rates.get("MDL"), Some(&round2(1.0 / 0.056)));
        assert!(!rates.contains_key("XYZ"));
    }

    #[tokio::test]
    async fn test_history_on_date_cached() {
        let fetcher = StubFetcher::new(vec![(
            "/2024-03-05?",
            r#"{"rates":{"USD":0.055}}"#,
        )]);
        let resolver = resolver(fetcher.clone());

        let first = resolver
            .history_on_date("MDL", &["USD"], "2024-03-05")
            .await
            .unwrap();
        let second = resolver
            .history_on_date("MDL", &["USD"], "2024-03-05")
            .await
            .unwrap();
        assert_eq!(first.get("USD"), Some(&0.055));
        assert_eq!(second.get("USD"), Some(&0.055));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_on_date_failure_is_none() {
        let fetcher = StubFetcher::new(vec![]);
        let resolver = resolver(fetcher);

        assert!(
            resolver
                .history_on_date("MDL", &["USD"], "2024-03-05")
                .await
                .is_none()
        );
        assert!(
            resolver
                .history_on_date("MDL", &["USD"], "garbage")
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_history_range_cached() {
        let fetcher = StubFetcher::new(vec![(
            "/timeseries",
            r#"{"rates":{"2024-03-05":{"USD":0.055}}}"#,
        )]);
        let resolver = resolver(fetcher.clone());

        resolver
            .history_range("MDL", "USD", "2024-03-05", "2024-03-05")
            .await
            .unwrap();
        resolver
            .history_range("MDL", "USD", "2024-03-05", "2024-03-05")
            .await
            .unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_range_unparsable_bound_is_none() {
        let fetcher = StubFetcher::new(vec![]);
        let resolver = resolver(fetcher.clone());

        assert!(
            resolver
                .history_range("MDL", "USD", "soon", "2024-03-05")
                .await
                .is_none()
        );
        // nothing was fetched for an unusable range
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sanitize_range_swaps_reversed_bounds() {
        let (start, end) = sanitize_range("2024-03-10", "2024-03-05").unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    }

    #[test]
    fn test_sanitize_range_clamps_future_end() {
        let today = Utc::now().date_naive();
        let (start, end) = sanitize_range("2024-03-05", "2999-01-01").unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(end, today);

        let (start, end) = sanitize_range("2999-01-01", "2999-06-01").unwrap();
        assert_eq!(start, today);
        assert_eq!(end, today);
    }

    #[test]
    fn test_sanitize_range_rejects_garbage() {
        assert!(sanitize_range("2024-03-05", "garbage").is_none());
        assert!(sanitize_range("", "2024-03-05").is_none());
    }

    #[tokio::test]
    async fn test_custom_provider_url_from_config() {
        let fetcher = StubFetcher::new(vec![("rates.internal", LATEST_BODY)]);
        let mut config = EngineConfig::default();
        config.providers.primary = Some(PrimaryProviderConfig {
            base_url: "http://rates.internal".to_string(),
        });
        let resolver = CurrencyResolver::with_fetcher(&config, fetcher);

        let snapshot = resolver.get_rates().await;
        assert_eq!(snapshot.rates.get("EUR"), Some(&0.052));
    }
}
