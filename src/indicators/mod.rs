// Technical indicators module
// Bollinger bands, RSI and MACD over a candle series

pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;

pub use bollinger::{bollinger_series, BollingerPoint};
pub use macd::{macd_series, MacdPoint};
pub use moving_average::{calculate_sma, ema_series, ewm_series, sma_series};
pub use rsi::rsi_series;

use crate::error::BotError;
use crate::models::{CandleSeries, IndicatorRow, IndicatorSet};
use crate::Result;

pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_WIDTH: f64 = 2.0;
pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Leading rows dropped from every indicator table
pub const WARMUP_PERIODS: usize = max(BOLLINGER_PERIOD, MACD_SLOW + MACD_SIGNAL) - 1;

/// Smallest series that still yields one indicator row
pub const MIN_HISTORY: usize = WARMUP_PERIODS + 1;

const fn max(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

/// Derive Bollinger/RSI/MACD for every candle and drop the warm-up rows
///
/// The output has exactly `series.len() - WARMUP_PERIODS` rows, each one
/// carrying the original OHLCV values next to its indicators.
pub fn compute_indicators(series: &CandleSeries) -> Result<IndicatorSet> {
    if series.len() < MIN_HISTORY {
        return Err(BotError::InsufficientHistory {
            required: MIN_HISTORY,
            available: series.len(),
        });
    }

    let closes = series.closes();
    let bands = bollinger_series(&closes, BOLLINGER_PERIOD, BOLLINGER_WIDTH);
    let rsi = rsi_series(&closes, RSI_PERIOD);
    let macd = macd_series(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);

    let mut rows = Vec::with_capacity(series.len() - WARMUP_PERIODS);
    for (i, candle) in series.candles.iter().enumerate().skip(WARMUP_PERIODS) {
        let (Some(band), Some(rsi), Some(macd)) = (bands[i], rsi[i], macd[i]) else {
            tracing::debug!("Indicator row {} for {} incomplete, dropping", i, series.market);
            continue;
        };

        rows.push(IndicatorRow {
            timestamp: candle.timestamp,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            bb_mid: band.mid,
            bb_high: band.high,
            bb_low: band.low,
            rsi,
            macd: macd.macd,
            macd_signal: macd.signal,
            macd_diff: macd.histogram,
        });
    }

    if rows.is_empty() {
        return Err(BotError::InsufficientHistory {
            required: MIN_HISTORY,
            available: series.len(),
        });
    }

    Ok(IndicatorSet {
        market: series.market.clone(),
        interval: series.interval,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, CandleInterval};
    use chrono::{Duration, TimeZone, Utc};

    fn series_from(closes: &[f64]) -> CandleSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        CandleSeries {
            market: "KRW-BTC".to_string(),
            interval: CandleInterval::Day,
            candles: closes
                .iter()
                .enumerate()
                .map(|(i, close)| Candle {
                    market: "KRW-BTC".to_string(),
                    timestamp: start + Duration::days(i as i64),
                    open: close - 1.0,
                    high: close + 2.0,
                    low: close - 2.0,
                    close: *close,
                    volume: 10.0 + i as f64,
                })
                .collect(),
        }
    }

    #[test]
    fn test_warmup_constants() {
        assert_eq!(WARMUP_PERIODS, 34);
        assert_eq!(MIN_HISTORY, 35);
    }

    #[test]
    fn test_output_length_drops_warmup() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 50_000_000.0 + (i as f64 * 0.7).sin() * 1_000_000.0)
            .collect();
        let set = compute_indicators(&series_from(&closes)).unwrap();

        assert_eq!(set.len(), 60 - WARMUP_PERIODS);
        assert!(set.rows.iter().all(|r| (0.0..=100.0).contains(&r.rsi)));
    }

    #[test]
    fn test_minimum_history_yields_one_row() {
        let closes: Vec<f64> = (0..35).map(|i| 100.0 + (i % 5) as f64).collect();
        let set = compute_indicators(&series_from(&closes)).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.rows[0].close, closes[34]);
    }

    #[test]
    fn test_short_series_is_insufficient_history() {
        let closes: Vec<f64> = (0..34).map(|i| 100.0 + i as f64).collect();
        let result = compute_indicators(&series_from(&closes));

        assert!(matches!(
            result,
            Err(BotError::InsufficientHistory {
                required: 35,
                available: 34
            })
        ));
    }

    #[test]
    fn test_uptrend_band_ordering() {
        let closes: Vec<f64> = (0..60).map(|i| 40_000_000.0 + i as f64 * 250_000.0).collect();
        let set = compute_indicators(&series_from(&closes)).unwrap();

        assert_eq!(set.len(), 26);
        for row in &set.rows {
            assert!(row.bb_high > row.bb_mid);
            assert!(row.bb_mid > row.bb_low);
        }
        // a steady climb is all gains
        assert_eq!(set.latest().unwrap().rsi, 100.0);
    }
}
