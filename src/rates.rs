//! Core rate types shared across the engine.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Per-currency rates relative to a single base, at one point in time.
pub type DayRates = HashMap<String, f64>;

/// Date-ordered historical rates, one [`DayRates`] per calendar day.
pub type RateSeries = BTreeMap<NaiveDate, DayRates>;

/// The latest known rates relative to `base`, stamped at fetch time.
///
/// Immutable once constructed; a refresh builds a new snapshot and swaps it
/// in wholesale. `rates` never contains the base currency itself, its rate
/// is implicitly 1.0.
#[derive(Debug, Clone, Serialize)]
pub struct RateSnapshot {
    pub base: String,
    pub rates: HashMap<String, f64>,
    /// Fetch time in milliseconds since the epoch.
    pub timestamp: i64,
}

impl RateSnapshot {
    pub fn new(base: &str, mut rates: HashMap<String, f64>) -> Self {
        rates.remove(base);
        RateSnapshot {
            base: base.to_string(),
            rates,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Cache key for a single-date historical lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DayQuery {
    pub base: String,
    pub symbols: Vec<String>,
    pub date: NaiveDate,
}

/// Cache key for a date-range historical lookup, over sanitized bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeQuery {
    pub base: String,
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Rounds a rate to 2 decimals for display.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_strips_base() {
        let rates = HashMap::from([
            ("MDL".to_string(), 1.0),
            ("USD".to_string(), 0.057),
        ]);
        let snapshot = RateSnapshot::new("MDL", rates);
        assert!(!snapshot.rates.contains_key("MDL"));
        assert_eq!(snapshot.rates.get("USD"), Some(&0.057));
        assert!(snapshot.timestamp > 0);
    }

    #[test]
    fn test_snapshot_serializes_wire_shape() {
        let snapshot = RateSnapshot::new("MDL", HashMap::from([("USD".to_string(), 0.057)]));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["base"], "MDL");
        assert_eq!(json["rates"]["USD"], 0.057);
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(17.543), 17.54);
        assert_eq!(round2(0.0567), 0.06);
        assert_eq!(round2(5.2), 5.2);
        assert_eq!(round2(-0.126), -0.13);
    }
}
