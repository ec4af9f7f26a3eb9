//! Fallback ordering across the rate providers.
//!
//! Range queries walk the chain: primary timeseries, then the secondary
//! provider when both codes are allow-listed, then one single-date lookup
//! per calendar day. Single-date queries try the primary only.

use crate::providers::exchange_host::ExchangeHostProvider;
use crate::providers::frankfurter::FrankfurterProvider;
use crate::rates::{DayRates, RateSeries};
use chrono::NaiveDate;
use tracing::{debug, info};

pub struct ProviderChain {
    primary: ExchangeHostProvider,
    secondary: FrankfurterProvider,
}

impl ProviderChain {
    pub fn new(primary: ExchangeHostProvider, secondary: FrankfurterProvider) -> Self {
        ProviderChain { primary, secondary }
    }

    pub async fn latest(&self, base: &str, symbols: &[String]) -> Option<DayRates> {
        self.primary.latest(base, symbols).await
    }

    /// Single-date lookups have no secondary or day-by-day fallback.
    pub async fn on_date(&self, base: &str, symbols: &[String], date: NaiveDate) -> Option<DayRates> {
        self.primary.on_date(base, symbols, date).await
    }

    /// Best available series for `[start, end]`. Dates arrive pre-sanitized
    /// from the facade: start <= end <= today.
    pub async fn range(
        &self,
        base: &str,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<RateSeries> {
        if let Some(series) = self.primary.timeseries(base, symbol, start, end).await {
            return Some(series);
        }

        if FrankfurterProvider::supports(base) && FrankfurterProvider::supports(symbol) {
            debug!("Trying secondary provider for {}/{}", base, symbol);
            if let Some(series) = self.secondary.range(base, symbol, start, end).await {
                info!("History range fetched from secondary provider");
                return Some(series);
            }
        }

        debug!("Degrading to day-by-day history fetch: {}..{}", start, end);
        self.day_by_day(base, symbol, start, end).await
    }

    /// One single-date lookup per day; failed days are omitted rather than
    /// failing the whole range. An empty assembled series is a failure.
    async fn day_by_day(
        &self,
        base: &str,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<RateSeries> {
        let symbols = [symbol.to_string()];
        let mut series = RateSeries::new();

        let mut day = start;
        while day <= end {
            if let Some(rates) = self.primary.on_date(base, &symbols, day).await {
                if let Some(rate) = rates.get(symbol) {
                    series.insert(day, DayRates::from([(symbol.to_string(), *rate)]));
                }
            }
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        if series.is_empty() { None } else { Some(series) }
    }
}
