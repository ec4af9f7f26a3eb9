pub mod chain;
pub mod exchange_host;
pub mod frankfurter;

pub use chain::ProviderChain;
pub use exchange_host::ExchangeHostProvider;
pub use frankfurter::FrankfurterProvider;
