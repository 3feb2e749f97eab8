pub mod aggregate;
pub mod ma;
pub mod window;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{AggregationError, ExchangeError, IndicatorError};
use crate::indicator::aggregate::period_means;
use crate::indicator::ma::{cumulative_sma, smoothed_ema};
use crate::indicator::window::TimeRange;

/// Provider of historical close prices for a pair over a time window.
pub trait QuoteSource: Send + Sync {
    /// Close prices recorded for `pair` between `from` and `to`, oldest first.
    ///
    /// `limit` is passed through to the provider untouched (for EXMO it is the
    /// candle resolution).
    fn close_prices(
        &self,
        pair: &str,
        limit: u32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<f64>, Report<ExchangeError>>>;
}

/// Reduces a per-period series to an indicator series of the same length.
pub type ReduceFn = fn(&[f64], usize) -> Vec<f64>;

/// The pair of reductions an [`IndicatorEngine`] applies.
#[derive(Debug, Clone, Copy)]
pub struct Reductions {
    pub sma: ReduceFn,
    pub ema: ReduceFn,
}

impl Default for Reductions {
    fn default() -> Self {
        Self {
            sma: cumulative_sma,
            ema: smoothed_ema,
        }
    }
}

/// Computes SMA/EMA series by splitting a time range into periods and
/// averaging the close prices of each period.
///
/// Holds no per-call state; one engine can serve concurrent requests.
pub struct IndicatorEngine {
    source: Arc<dyn QuoteSource>,
    reductions: Reductions,
    fetch_concurrency: usize,
    cancel: CancellationToken,
}

impl IndicatorEngine {
    pub fn new(source: Arc<dyn QuoteSource>) -> Self {
        Self {
            source,
            reductions: Reductions::default(),
            fetch_concurrency: 1,
            cancel: CancellationToken::new(),
        }
    }

    #[allow(dead_code)]
    pub fn with_sma(mut self, sma: ReduceFn) -> Self {
        self.reductions.sma = sma;
        self
    }

    #[allow(dead_code)]
    pub fn with_ema(mut self, ema: ReduceFn) -> Self {
        self.reductions.ema = ema;
        self
    }

    /// Allow up to `n` period requests in flight at once (values below 1 mean 1).
    pub fn with_fetch_concurrency(mut self, n: usize) -> Self {
        self.fetch_concurrency = n.max(1);
        self
    }

    /// Abort in-progress and future aggregations once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Mean close price of each of `period` equal windows of `[from, to]`.
    ///
    /// Input is validated before any quote is requested.
    pub async fn period_series(
        &self,
        pair: &str,
        limit: u32,
        period: usize,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<f64>, Report<AggregationError>> {
        let windows = TimeRange::new(from, to)?.split(period)?;

        let means = period_means(
            self.source.as_ref(),
            pair,
            limit,
            &windows,
            self.fetch_concurrency,
            &self.cancel,
        )
        .await
        .attach_with(|| format!("pair: {pair}, period: {period}"))?;

        Ok(means)
    }

    pub async fn compute_sma(
        &self,
        pair: &str,
        limit: u32,
        period: usize,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<f64>, Report<IndicatorError>> {
        let series = self
            .period_series(pair, limit, period, from, to)
            .await
            .change_context(IndicatorError::Sma)?;

        let values = (self.reductions.sma)(&series, period);
        info!(pair, period, values = values.len(), "sma computed");
        Ok(values)
    }

    pub async fn compute_ema(
        &self,
        pair: &str,
        limit: u32,
        period: usize,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<f64>, Report<IndicatorError>> {
        let series = self
            .period_series(pair, limit, period, from, to)
            .await
            .change_context(IndicatorError::Ema)?;

        let values = (self.reductions.ema)(&series, period);
        info!(pair, period, values = values.len(), "ema computed");
        Ok(values)
    }
}
