//! Crossover detection over the MACD histogram confirmed by the Heikin Ashi candle direction.

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumString};
use yata::core::ValueType;

use super::{heikin_ashi::HeikinAshiCandle, macd::MacdPoint};
use crate::error::Error;

const DEFAULT_APPROACHING_POINTS: usize = 2;

#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    Buy,
    ApproachingBuy,
    Sell,
    ApproachingSell,
}

impl SignalKind {
    pub fn is_crossover(&self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Signal {
    pub ticker: String,
    pub date: NaiveDate,
    pub kind: SignalKind,
}

fn default_approaching_points() -> usize {
    DEFAULT_APPROACHING_POINTS
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DetectorConfig {
    /// Number of trailing histogram points that must be strictly converging toward zero
    #[serde(default = "default_approaching_points")]
    pub approaching_points: usize,
    /// Minimum move between two consecutive converging points
    #[serde(default)]
    pub approaching_min_step: ValueType,
    /// Projected number of points until the crossover, at the average step of the window
    #[serde(default)]
    pub approaching_max_days: Option<ValueType>,
    #[serde(default)]
    pub detect_sell: bool,
    /// Drop a signal when the same kind was kept within this many calendar days
    #[serde(default)]
    pub cooldown_days: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            approaching_points: DEFAULT_APPROACHING_POINTS,
            approaching_min_step: 0.0,
            approaching_max_days: None,
            detect_sell: false,
            cooldown_days: 0,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.approaching_points < 2 {
            return Err(Error::InvalidConfiguration(format!(
                "approaching_points must be at least 2, got {}",
                self.approaching_points
            )));
        }
        if !(self.approaching_min_step >= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "approaching_min_step must be non-negative, got {}",
                self.approaching_min_step
            )));
        }
        if let Some(days) = self.approaching_max_days {
            if !(days > 0.0) {
                return Err(Error::InvalidConfiguration(format!(
                    "approaching_max_days must be positive, got {}",
                    days
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Orient a histogram value so that converging toward zero is always increasing.
    fn orient(&self, value: ValueType) -> ValueType {
        match self {
            Self::Buy => value,
            Self::Sell => -value,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SignalDetector {
    config: DetectorConfig,
}

impl SignalDetector {
    pub fn try_new(config: DetectorConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Emit at most one signal per date, in date order.
    pub fn detect(
        &self,
        ticker: &str,
        candles: &[HeikinAshiCandle],
        points: &[MacdPoint],
    ) -> Result<Vec<Signal>, Error> {
        check_alignment(candles, points)?;

        let histogram: Vec<ValueType> = points.iter().map(|point| point.histogram).collect();

        let signals: Vec<Signal> = candles
            .iter()
            .enumerate()
            .filter_map(|(idx, candle)| {
                self.classify(&histogram[..=idx], candle)
                    .map(|kind| Signal {
                        ticker: ticker.to_string(),
                        date: candle.date,
                        kind,
                    })
            })
            .collect();

        log::debug!(
            "{}: {} signals over {} points",
            ticker,
            signals.len(),
            points.len()
        );

        Ok(signals)
    }

    fn classify(&self, history: &[ValueType], candle: &HeikinAshiCandle) -> Option<SignalKind> {
        let (previous, current) = match history {
            [.., previous, current] => (*previous, *current),
            _ => return None,
        };
        let detect_sell = self.config.detect_sell;

        if previous <= 0.0 && current > 0.0 && candle.is_bullish() {
            Some(SignalKind::Buy)
        } else if detect_sell && previous >= 0.0 && current < 0.0 && candle.is_bearish() {
            Some(SignalKind::Sell)
        } else if current < 0.0 && candle.is_bullish() && self.is_approaching(history, Side::Buy) {
            Some(SignalKind::ApproachingBuy)
        } else if detect_sell
            && current > 0.0
            && candle.is_bearish()
            && self.is_approaching(history, Side::Sell)
        {
            Some(SignalKind::ApproachingSell)
        } else {
            None
        }
    }

    fn is_approaching(&self, history: &[ValueType], side: Side) -> bool {
        let size = self.config.approaching_points;
        if history.len() < size {
            return false;
        }

        let window: Vec<ValueType> = history[history.len() - size..]
            .iter()
            .map(|value| side.orient(*value))
            .collect();

        let converging = window
            .iter()
            .tuple_windows()
            .all(|(previous, current)| current - previous > self.config.approaching_min_step);

        if !converging {
            return false;
        }

        match self.config.approaching_max_days {
            None => true,
            Some(max_days) => {
                let average_step = (window[size - 1] - window[0]) / (size - 1) as ValueType;
                window[size - 1].abs() / average_step <= max_days
            }
        }
    }
}

/// Both series must cover the same dates, one to one.
pub fn check_alignment(candles: &[HeikinAshiCandle], points: &[MacdPoint]) -> Result<(), Error> {
    if candles.len() != points.len() {
        return Err(Error::AlignmentMismatch(format!(
            "{} candles for {} MACD points",
            candles.len(),
            points.len()
        )));
    }

    if let Some((candle, point)) = candles
        .iter()
        .zip(points.iter())
        .find(|(candle, point)| candle.date != point.date)
    {
        return Err(Error::AlignmentMismatch(format!(
            "candle of {} against MACD point of {}",
            candle.date, point.date
        )));
    }

    Ok(())
}

/// Drop signals whose kind was already kept within `cooldown_days` calendar days.
pub fn suppress_duplicates(signals: Vec<Signal>, cooldown_days: u32) -> Vec<Signal> {
    if cooldown_days == 0 {
        return signals;
    }

    let mut last_kept: HashMap<SignalKind, NaiveDate> = HashMap::new();
    signals
        .into_iter()
        .filter(|signal| {
            let duplicate = last_kept
                .get(&signal.kind)
                .map_or(false, |date| {
                    (signal.date - *date).num_days() <= cooldown_days as i64
                });

            if duplicate {
                log::debug!(
                    "{}: {} on {} already signaled within {} days",
                    signal.ticker,
                    signal.kind,
                    signal.date,
                    cooldown_days
                );
            } else {
                last_kept.insert(signal.kind, signal.date);
            }
            !duplicate
        })
        .collect()
}
