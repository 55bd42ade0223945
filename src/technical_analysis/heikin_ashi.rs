//! Heikin Ashi smoothing of daily bars.
//!
//! Each candle depends on the previous one, so the series is built with a
//! single ordered fold over the bars.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use yata::core::{ValueType, OHLCV};

use crate::{error::Error, record::Bar};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HeikinAshiCandle {
    pub date: NaiveDate,
    #[serde(rename = "ha_open")]
    pub open: ValueType,
    #[serde(rename = "ha_high")]
    pub high: ValueType,
    #[serde(rename = "ha_low")]
    pub low: ValueType,
    #[serde(rename = "ha_close")]
    pub close: ValueType,
}

impl HeikinAshiCandle {
    fn first(bar: &Bar) -> Self {
        Self {
            date: bar.date,
            open: (bar.open() + bar.close()) / 2.0,
            high: bar.high(),
            low: bar.low(),
            close: bar.ohlc4(),
        }
    }

    fn next(&self, bar: &Bar) -> Self {
        let open = (self.open + self.close) / 2.0;
        let close = bar.ohlc4();

        Self {
            date: bar.date,
            open,
            high: bar.high().max(open).max(close),
            low: bar.low().min(open).min(close),
            close,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

impl PartialEq for HeikinAshiCandle {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date
            && self.open.to_bits() == other.open.to_bits()
            && self.high.to_bits() == other.high.to_bits()
            && self.low.to_bits() == other.low.to_bits()
            && self.close.to_bits() == other.close.to_bits()
    }
}

impl Eq for HeikinAshiCandle {}

/// Convert bars into Heikin Ashi candles, one candle per bar.
pub fn transform(bars: &[Bar]) -> Result<Vec<HeikinAshiCandle>, Error> {
    let (first, rest) = bars
        .split_first()
        .ok_or(Error::InsufficientData { required: 1, got: 0 })?;

    let mut seed = Vec::with_capacity(bars.len());
    seed.push(HeikinAshiCandle::first(first));

    Ok(rest.iter().fold(seed, |mut candles, bar| {
        let candle = candles[candles.len() - 1].next(bar);
        candles.push(candle);
        candles
    }))
}
