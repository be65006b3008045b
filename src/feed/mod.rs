//! Price feed
//!
//! [`PriceSource`] is the seam between the tracking engine and the
//! outside world; the production implementation is the CoinMarketCap
//! quotes API.

mod coinmarketcap;

pub use coinmarketcap::CoinMarketCap;

use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Source of current prices in USD
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current USD price for a currency symbol.
    ///
    /// Fails with `CurrencyNotFound` for unknown symbols,
    /// `FeedUnavailable` for transport/server problems, and
    /// `MalformedQuote` when the response shape is unexpected.
    async fn price(&self, symbol: &str) -> Result<Decimal>;
}
