use super::moving_average::ema_series;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD: EMA(fast) − EMA(slow), signal line = EMA(signal) of that difference
///
/// The signal EMA starts at the first defined MACD value, so the first
/// complete point appears at index `slow + signal - 2`.
pub fn macd_series(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<Option<MacdPoint>> {
    let closes: Vec<Option<f64>> = prices.iter().map(|p| Some(*p)).collect();
    let ema_fast = ema_series(&closes, fast);
    let ema_slow = ema_series(&closes, slow);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal_line = ema_series(&macd_line, signal);

    macd_line
        .into_iter()
        .zip(signal_line)
        .map(|(m, s)| match (m, s) {
            (Some(macd), Some(signal)) => Some(MacdPoint {
                macd,
                signal,
                histogram: macd - signal,
            }),
            _ => None,
        })
        .collect()
}
