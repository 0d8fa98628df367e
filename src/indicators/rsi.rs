use super::moving_average::ewm_series;

/// Relative Strength Index (RSI) for every candle
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// Average gain/loss use Wilder's smoothing (`alpha = 1 / period`). The first
/// candle has no prior close and counts as a zero change. When the average
/// loss is zero the RSI is pinned to 100.
pub fn rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut gains = Vec::with_capacity(prices.len());
    let mut losses = Vec::with_capacity(prices.len());

    for i in 0..prices.len() {
        let change = if i == 0 { 0.0 } else { prices[i] - prices[i - 1] };
        gains.push(Some(change.max(0.0)));
        losses.push(Some((-change).max(0.0)));
    }

    let alpha = 1.0 / period as f64;
    let avg_gains = ewm_series(&gains, alpha, period);
    let avg_losses = ewm_series(&losses, alpha, period);

    avg_gains
        .into_iter()
        .zip(avg_losses)
        .map(|(gain, loss)| match (gain, loss) {
            (Some(_), Some(loss)) if loss == 0.0 => Some(100.0),
            (Some(gain), Some(loss)) => Some(100.0 - 100.0 / (1.0 + gain / loss)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_calculation() {
        let prices = vec![
            44.0, 44.25, 44.5, 43.75, 44.0, 44.5, 45.0, 45.5, 45.25, 45.5, 46.0, 46.5, 46.25,
            46.0, 46.5,
        ];

        let rsi = rsi_series(&prices, 14);
        assert_eq!(rsi.len(), prices.len());
        assert!(rsi[12].is_none());

        let rsi_value = rsi[14].unwrap();
        assert!(rsi_value > 0.0 && rsi_value < 100.0);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let prices = vec![100.0, 102.0, 101.0];
        let rsi = rsi_series(&prices, 14);
        assert!(rsi.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_rsi_all_gains() {
        let prices = vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0];
        let rsi = rsi_series(&prices, 5);
        assert_eq!(rsi[5], Some(100.0)); // All gains = RSI 100
    }

    #[test]
    fn test_rsi_all_losses() {
        let prices = vec![105.0, 104.0, 103.0, 102.0, 101.0, 100.0];
        let rsi = rsi_series(&prices, 5);
        assert_eq!(rsi[5], Some(0.0));
    }
}
