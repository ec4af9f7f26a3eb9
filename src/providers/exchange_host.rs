//! Primary rate provider, speaking the exchangerate.host URL shapes.

use crate::fetch::WireFetch;
use crate::parse::{parse_flat, parse_series};
use crate::rates::{DayRates, RateSeries};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::warn;

pub struct ExchangeHostProvider {
    base_url: String,
    fetcher: Arc<dyn WireFetch>,
}

impl ExchangeHostProvider {
    pub fn new(base_url: &str, fetcher: Arc<dyn WireFetch>) -> Self {
        ExchangeHostProvider {
            base_url: base_url.to_string(),
            fetcher,
        }
    }

    pub async fn latest(&self, base: &str, symbols: &[String]) -> Option<DayRates> {
        let url = format!(
            "{}/latest?base={}&symbols={}",
            self.base_url,
            base,
            symbols.join(",")
        );
        self.fetch_flat(&url).await
    }

    pub async fn on_date(&self, base: &str, symbols: &[String], date: NaiveDate) -> Option<DayRates> {
        let url = format!(
            "{}/{}?base={}&symbols={}",
            self.base_url,
            date,
            base,
            symbols.join(",")
        );
        self.fetch_flat(&url).await
    }

    pub async fn timeseries(
        &self,
        base: &str,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<RateSeries> {
        let url = format!(
            "{}/timeseries?start_date={}&end_date={}&base={}&symbols={}",
            self.base_url, start, end, base, symbol
        );
        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Primary timeseries request failed: {e}");
                return None;
            }
        };
        parse_series(&body)
    }

    async fn fetch_flat(&self, url: &str) -> Option<DayRates> {
        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Primary rate request failed: {e}");
                return None;
            }
        };
        parse_flat(&body)
    }
}
