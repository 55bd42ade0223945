use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use yata::core::{ValueType, OHLCV};

use crate::{
    error::Error,
    utils::serde::{date_from_string, f64_from_string, ticker_from_string},
};

lazy_static! {
    static ref TICKER_PATTERN: Regex = Regex::new(r"^[A-Z][A-Z0-9.\-]{0,9}$").unwrap();
}

/// Normalise a ticker symbol and check it looks like one.
pub fn normalize_ticker(ticker: &str) -> Result<String, Error> {
    let normalized = ticker.trim().to_uppercase();
    if TICKER_PATTERN.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(Error::InvalidTicker(ticker.to_string()))
    }
}

/// One trading day of a ticker
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Bar {
    #[serde(alias = "symbol", deserialize_with = "ticker_from_string")]
    pub ticker: String,
    #[serde(deserialize_with = "date_from_string")]
    pub date: NaiveDate,
    #[serde(deserialize_with = "f64_from_string")]
    pub open: ValueType,
    #[serde(deserialize_with = "f64_from_string")]
    pub high: ValueType,
    #[serde(deserialize_with = "f64_from_string")]
    pub low: ValueType,
    #[serde(deserialize_with = "f64_from_string")]
    pub close: ValueType,
    #[serde(deserialize_with = "f64_from_string")]
    pub volume: ValueType,
}

impl Bar {
    pub fn new(
        ticker: &str,
        date: NaiveDate,
        open: ValueType,
        high: ValueType,
        low: ValueType,
        close: ValueType,
        volume: ValueType,
    ) -> Self {
        Self {
            ticker: ticker.to_string(),
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl OHLCV for Bar {
    #[inline]
    fn open(&self) -> ValueType {
        self.open
    }

    #[inline]
    fn high(&self) -> ValueType {
        self.high
    }

    #[inline]
    fn low(&self) -> ValueType {
        self.low
    }

    #[inline]
    fn close(&self) -> ValueType {
        self.close
    }

    #[inline]
    fn volume(&self) -> ValueType {
        self.volume
    }
}

impl PartialEq for Bar {
    fn eq(&self, other: &Self) -> bool {
        self.ticker == other.ticker
            && self.date == other.date
            && self.open.to_bits() == other.open.to_bits()
            && self.high.to_bits() == other.high.to_bits()
            && self.low.to_bits() == other.low.to_bits()
            && self.close.to_bits() == other.close.to_bits()
            && self.volume.to_bits() == other.volume.to_bits()
    }
}

/// Check that every bar belongs to `ticker` and that dates are strictly ascending.
pub fn validate_series(ticker: &str, bars: &[Bar]) -> Result<(), Error> {
    if let Some(bar) = bars.iter().find(|bar| bar.ticker != ticker) {
        return Err(Error::TickerMismatch {
            expected: ticker.to_string(),
            found: bar.ticker.clone(),
        });
    }

    if let Some(pair) = bars.windows(2).find(|pair| pair[0].date >= pair[1].date) {
        return Err(Error::UnorderedBars {
            ticker: ticker.to_string(),
            date: pair[1].date,
        });
    }

    Ok(())
}
