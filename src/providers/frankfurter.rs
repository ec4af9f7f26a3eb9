//! Secondary range provider, speaking the frankfurter.app URL shape.
//!
//! Frankfurter only serves a fixed set of major currencies; MDL is not
//! among them, so this provider is only consulted when both ends of a
//! query sit inside the allow-list.

use crate::fetch::WireFetch;
use crate::parse::parse_series;
use crate::rates::RateSeries;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

const SUPPORTED: [&str; 30] = [
    "EUR", "USD", "GBP", "CHF", "JPY", "AUD", "CAD", "NZD", "SEK", "NOK", "DKK", "PLN", "CZK",
    "HUF", "RON", "BGN", "TRY", "CNY", "HKD", "SGD", "INR", "MXN", "ZAR", "ILS", "KRW", "BRL",
    "PHP", "THB", "MYR", "IDR",
];

pub struct FrankfurterProvider {
    base_url: String,
    fetcher: Arc<dyn WireFetch>,
}

impl FrankfurterProvider {
    pub fn new(base_url: &str, fetcher: Arc<dyn WireFetch>) -> Self {
        FrankfurterProvider {
            base_url: base_url.to_string(),
            fetcher,
        }
    }

    pub fn supports(code: &str) -> bool {
        SUPPORTED.contains(&code.to_uppercase().as_str())
    }

    pub async fn range(
        &self,
        base: &str,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<RateSeries> {
        let url = format!(
            "{}/{}..{}?from={}&to={}",
            self.base_url, start, end, base, symbol
        );
        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                debug!("Secondary range request failed: {e}");
                return None;
            }
        };
        parse_series(&body)
    }
}
