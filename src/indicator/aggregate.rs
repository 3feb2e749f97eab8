use error_stack::{Report, ResultExt};
use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::AggregationError;
use crate::indicator::QuoteSource;
use crate::indicator::window::TimeRange;

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    Some(prices.iter().sum::<f64>() / prices.len() as f64)
}

/// Reduce each window to the mean of its close prices, in window order.
///
/// At most `concurrency` quote requests are in flight at once; `1` issues
/// them strictly one after another. The first failing window aborts the
/// whole series and drops any request still pending.
pub async fn period_means(
    source: &dyn QuoteSource,
    pair: &str,
    limit: u32,
    windows: &[TimeRange],
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<Vec<f64>, Report<AggregationError>> {
    let mut means: Vec<Option<f64>> = vec![None; windows.len()];

    let mut pending = stream::iter(windows.iter().copied().enumerate())
        .map(|(index, window)| window_mean(source, pair, limit, index, window))
        .buffer_unordered(concurrency.max(1));

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(pair, "period aggregation cancelled");
                return Err(Report::new(AggregationError::Cancelled));
            }
            next = pending.next() => next,
        };

        let Some(result) = next else { break };
        let (index, value) = result?;
        means[index] = Some(value);
    }

    Ok(means.into_iter().flatten().collect())
}

async fn window_mean(
    source: &dyn QuoteSource,
    pair: &str,
    limit: u32,
    index: usize,
    window: TimeRange,
) -> Result<(usize, f64), Report<AggregationError>> {
    debug!(
        pair,
        window = index,
        from = %window.start(),
        to = %window.end(),
        "fetching close prices"
    );

    let prices = source
        .close_prices(pair, limit, window.start(), window.end())
        .await
        .change_context(AggregationError::Source { window: index })
        .attach_with(|| format!("range: {} .. {}", window.start(), window.end()))?;

    let value = mean(&prices).ok_or_else(|| {
        Report::new(AggregationError::EmptyWindow { window: index })
            .attach(format!("range: {} .. {}", window.start(), window.end()))
    })?;

    debug!(pair, window = index, prices = prices.len(), mean = value, "window reduced");
    Ok((index, value))
}
