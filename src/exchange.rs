pub mod exmo;

use chrono::{DateTime, Utc};
use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::ExchangeError;
use crate::model::{Candle, Currencies, OrderBook, Ticker, Trades};

/// Public (unauthenticated) market data endpoints of an exchange.
pub trait Exchange: Send + Sync {
    /// Latest statistics for every listed pair.
    fn ticker(&self) -> BoxFuture<'_, Result<Ticker, Report<ExchangeError>>>;

    /// Recent deals for each of `pairs`, merged into one map.
    fn trades(&self, pairs: &[String]) -> BoxFuture<'_, Result<Trades, Report<ExchangeError>>>;

    /// Order book for each of `pairs`, at most `limit` levels per side.
    fn order_book(
        &self,
        limit: usize,
        pairs: &[String],
    ) -> BoxFuture<'_, Result<OrderBook, Report<ExchangeError>>>;

    fn currencies(&self) -> BoxFuture<'_, Result<Currencies, Report<ExchangeError>>>;

    /// Candles for `pair` between `from` and `to`, `resolution` being the
    /// candle width as understood by the exchange.
    fn candles_history(
        &self,
        pair: &str,
        resolution: u32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Candle>, Report<ExchangeError>>>;
}
