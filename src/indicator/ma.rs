//! Moving-average reductions over a per-period price series.
//!
//! Both take the requested `period` alongside the series so they can be
//! swapped for any other `ReduceFn` without changing the call site.

/// Expanding-window mean: `out[i] = (data[0] + .. + data[i]) / (i + 1)`.
pub fn cumulative_sma(data: &[f64], _period: usize) -> Vec<f64> {
    let mut sum = 0.0;
    data.iter()
        .enumerate()
        .map(|(i, price)| {
            sum += price;
            sum / (i + 1) as f64
        })
        .collect()
}

/// Smoothing factor `2 / (1 + period)`.
pub fn ema_factor(period: usize) -> f64 {
    2.0 / (1.0 + period as f64)
}

/// Single-step exponential blend of each value with its raw predecessor.
///
/// `out[0] = data[0] * k`, `out[i] = data[i] * k + data[i - 1] * (1 - k)`.
///
/// Unlike the textbook EMA this does not recurse on the previous output; the
/// formula is kept as-is because downstream consumers compare against it.
pub fn smoothed_ema(data: &[f64], period: usize) -> Vec<f64> {
    let k = ema_factor(period);
    data.first()
        .map(|&first| first * k)
        .into_iter()
        .chain(data.windows(2).map(|w| w[1] * k + w[0] * (1.0 - k)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_is_running_mean() {
        assert_eq!(cumulative_sma(&[1.0, 2.0, 3.0], 3), vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn sma_first_value_is_input() {
        let values = cumulative_sma(&[42.0, 0.0], 2);
        assert_eq!(values[0], 42.0);
        assert_eq!(values[1], 21.0);
    }

    #[test]
    fn sma_empty_input() {
        assert!(cumulative_sma(&[], 3).is_empty());
    }

    #[test]
    fn ema_factor_from_period() {
        assert_eq!(ema_factor(1), 1.0);
        assert_eq!(ema_factor(3), 0.5);
        assert!((ema_factor(5) - 1.0 / 3.0).abs() < 1e-15);
    }

    #[test]
    fn ema_blends_raw_neighbours() {
        assert_eq!(smoothed_ema(&[1.0, 2.0, 3.0], 3), vec![0.5, 1.5, 2.5]);
    }

    #[test]
    fn ema_does_not_recurse_on_output() {
        // A recursive EMA would give 0.5, 1.25, 2.125
        let values = smoothed_ema(&[1.0, 2.0, 3.0], 3);
        assert_ne!(values[2], 2.125);
    }

    #[test]
    fn ema_factor_ignores_series_length() {
        // period 9 → k = 0.2 even though only two values are supplied
        let values = smoothed_ema(&[10.0, 20.0], 9);
        assert!((values[0] - 2.0).abs() < 1e-12);
        assert!((values[1] - 12.0).abs() < 1e-12);
    }

    #[test]
    fn ema_period_one_is_identity() {
        assert_eq!(smoothed_ema(&[6.0, 7.0], 1), vec![6.0, 7.0]);
    }

    #[test]
    fn ema_empty_input() {
        assert!(smoothed_ema(&[], 3).is_empty());
    }
}
