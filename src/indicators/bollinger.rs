/// Bollinger band values for a single candle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    pub mid: f64,
    pub high: f64,
    pub low: f64,
}

/// Bollinger bands: SMA(period) ± `width` × population standard deviation
///
/// The deviation uses the whole window as the population (ddof = 0).
pub fn bollinger_series(prices: &[f64], period: usize, width: f64) -> Vec<Option<BollingerPoint>> {
    (0..prices.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                return None;
            }
            let window = &prices[i + 1 - period..=i];
            let mid = window.iter().sum::<f64>() / period as f64;
            let variance = window.iter().map(|p| (p - mid).powi(2)).sum::<f64>() / period as f64;
            let band = width * variance.sqrt();

            Some(BollingerPoint {
                mid,
                high: mid + band,
                low: mid - band,
            })
        })
        .collect()
}
