//! Currency exchange-rate resolution engine.
//!
//! Answers "what is the rate between currency A and currency B, now or on a
//! past date or date range" while talking to unreliable third-party rate
//! providers. Rates are cached in two tiers with independent TTLs, resolved
//! through a provider fallback chain (primary timeseries, restricted
//! secondary, day-by-day degradation), and a provider outage degrades to a
//! configured stub table instead of an error, so the embedding service
//! never blocks on network weather.
//!
//! The entry point is [`CurrencyResolver`], constructed once per process
//! from an [`EngineConfig`] and shared by reference across callers.

pub mod cache;
pub mod config;
pub mod fetch;
pub mod log;
pub mod parse;
pub mod providers;
pub mod rates;
pub mod resolver;

pub use config::EngineConfig;
pub use rates::{DayRates, RateSeries, RateSnapshot, round2};
pub use resolver::CurrencyResolver;
