/// Calculate Simple Moving Average (SMA) over the last `period` prices
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}

/// Rolling SMA aligned with `prices`; `None` until `period` values are seen
pub fn sma_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| calculate_sma(&prices[..=i], period))
        .collect()
}

/// Exponentially weighted mean, recursive form:
/// `y0 = x0`, `yt = yt-1 + alpha * (xt - yt-1)`.
///
/// Leading `None` values are skipped, so the recursion is seeded at the first
/// real observation. Output stays `None` until `min_periods` observations
/// have been folded in.
pub fn ewm_series(values: &[Option<f64>], alpha: f64, min_periods: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut state: Option<f64> = None;
    let mut observed = 0usize;

    for value in values {
        if let Some(x) = value {
            state = Some(match state {
                None => *x,
                Some(prev) => prev + alpha * (x - prev),
            });
            observed += 1;
        }
        out.push(if observed >= min_periods { state } else { None });
    }

    out
}

/// EMA with the usual span convention (`alpha = 2 / (span + 1)`)
pub fn ema_series(values: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    ewm_series(values, 2.0 / (span as f64 + 1.0), span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let prices = vec![100.0, 102.0, 104.0, 106.0, 108.0];
        let sma = calculate_sma(&prices, 5);
        assert_eq!(sma, Some(104.0));
    }

    #[test]
    fn test_sma_insufficient_data() {
        let prices = vec![100.0, 102.0];
        let sma = calculate_sma(&prices, 5);
        assert!(sma.is_none());
    }

    #[test]
    fn test_sma_series_alignment() {
        let prices = vec![1.0, 2.0, 3.0, 4.0];
        let series = sma_series(&prices, 3);
        assert_eq!(series, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_ewm_seeds_at_first_observation() {
        let values = vec![None, Some(10.0), Some(20.0), Some(20.0)];
        let series = ewm_series(&values, 0.5, 2);
        assert_eq!(series, vec![None, None, Some(15.0), Some(17.5)]);
    }

    #[test]
    fn test_ema_tracks_rising_prices() {
        let prices: Vec<Option<f64>> = [100.0, 102.0, 104.0, 106.0, 108.0, 110.0]
            .iter()
            .map(|p| Some(*p))
            .collect();
        let ema = ema_series(&prices, 5);
        assert!(ema[3].is_none());
        let last = ema[5].unwrap();
        assert!(last > 104.0 && last < 110.0);
    }
}
