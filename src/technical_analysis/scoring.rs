//! Supporting indicators and signal confidence.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use yata::core::{ValueType, OHLCV};

use super::{
    average::rolling_mean,
    macd::MacdPoint,
    signal::{Signal, SignalKind},
};
use crate::{error::Error, record::Bar};

const DEFAULT_MA_PERIOD: usize = 50;
const DEFAULT_VOLUME_PERIOD: usize = 5;
const MAX_SCORE: i32 = 100;

/// Long moving average and volume average of a trading day
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SupportingPoint {
    pub date: NaiveDate,
    pub close: ValueType,
    pub volume: ValueType,
    pub ma_long: Option<ValueType>,
    pub volume_avg: Option<ValueType>,
}

pub fn supporting_series(
    bars: &[Bar],
    ma_period: usize,
    volume_period: usize,
) -> Vec<SupportingPoint> {
    let closes: Vec<ValueType> = bars.iter().map(|bar| bar.close()).collect();
    let volumes: Vec<ValueType> = bars.iter().map(|bar| bar.volume()).collect();

    bars.iter()
        .zip(rolling_mean(&closes, ma_period))
        .zip(rolling_mean(&volumes, volume_period))
        .map(|((bar, ma_long), volume_avg)| SupportingPoint {
            date: bar.date,
            close: bar.close(),
            volume: bar.volume(),
            ma_long,
            volume_avg,
        })
        .collect()
}

/// Analyst and earnings context provided alongside the bars
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AnalystSnapshot {
    #[serde(default)]
    pub days_until_earnings: Option<i64>,
    #[serde(default)]
    pub buy_ratio: Option<ValueType>,
    #[serde(default)]
    pub upside_to_target_pct: Option<ValueType>,
}

fn default_ma_period() -> usize {
    DEFAULT_MA_PERIOD
}

fn default_volume_period() -> usize {
    DEFAULT_VOLUME_PERIOD
}

fn default_crossover_score() -> i32 {
    50
}

fn default_approaching_score() -> i32 {
    30
}

fn default_buy_ratio_threshold() -> ValueType {
    0.70
}

fn default_buy_ratio_bonus() -> i32 {
    15
}

fn default_upside_threshold_pct() -> ValueType {
    15.0
}

fn default_upside_bonus() -> i32 {
    10
}

fn default_volume_bonus() -> i32 {
    10
}

fn default_earnings_safe_days() -> i64 {
    14
}

fn default_earnings_safe_bonus() -> i32 {
    10
}

fn default_earnings_imminent_days() -> i64 {
    7
}

fn default_earnings_imminent_penalty() -> i32 {
    -15
}

fn default_above_ma_bonus() -> i32 {
    5
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ScoringConfig {
    #[serde(default = "default_ma_period")]
    pub ma_period: usize,
    #[serde(default = "default_volume_period")]
    pub volume_period: usize,
    #[serde(default = "default_crossover_score")]
    pub crossover_score: i32,
    #[serde(default = "default_approaching_score")]
    pub approaching_score: i32,
    #[serde(default = "default_buy_ratio_threshold")]
    pub buy_ratio_threshold: ValueType,
    #[serde(default = "default_buy_ratio_bonus")]
    pub buy_ratio_bonus: i32,
    #[serde(default = "default_upside_threshold_pct")]
    pub upside_threshold_pct: ValueType,
    #[serde(default = "default_upside_bonus")]
    pub upside_bonus: i32,
    #[serde(default = "default_volume_bonus")]
    pub volume_bonus: i32,
    #[serde(default = "default_earnings_safe_days")]
    pub earnings_safe_days: i64,
    #[serde(default = "default_earnings_safe_bonus")]
    pub earnings_safe_bonus: i32,
    #[serde(default = "default_earnings_imminent_days")]
    pub earnings_imminent_days: i64,
    #[serde(default = "default_earnings_imminent_penalty")]
    pub earnings_imminent_penalty: i32,
    #[serde(default = "default_above_ma_bonus")]
    pub above_ma_bonus: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            ma_period: DEFAULT_MA_PERIOD,
            volume_period: DEFAULT_VOLUME_PERIOD,
            crossover_score: default_crossover_score(),
            approaching_score: default_approaching_score(),
            buy_ratio_threshold: default_buy_ratio_threshold(),
            buy_ratio_bonus: default_buy_ratio_bonus(),
            upside_threshold_pct: default_upside_threshold_pct(),
            upside_bonus: default_upside_bonus(),
            volume_bonus: default_volume_bonus(),
            earnings_safe_days: default_earnings_safe_days(),
            earnings_safe_bonus: default_earnings_safe_bonus(),
            earnings_imminent_days: default_earnings_imminent_days(),
            earnings_imminent_penalty: default_earnings_imminent_penalty(),
            above_ma_bonus: default_above_ma_bonus(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.ma_period == 0 || self.volume_period == 0 {
            return Err(Error::InvalidConfiguration(
                "scoring periods must be positive".to_string(),
            ));
        }
        if self.earnings_imminent_days >= self.earnings_safe_days {
            return Err(Error::InvalidConfiguration(format!(
                "earnings_imminent_days ({}) must be below earnings_safe_days ({})",
                self.earnings_imminent_days, self.earnings_safe_days
            )));
        }
        let points = [
            ("crossover_score", self.crossover_score),
            ("approaching_score", self.approaching_score),
            ("buy_ratio_bonus", self.buy_ratio_bonus),
            ("upside_bonus", self.upside_bonus),
            ("volume_bonus", self.volume_bonus),
            ("earnings_safe_bonus", self.earnings_safe_bonus),
            ("earnings_imminent_penalty", self.earnings_imminent_penalty),
            ("above_ma_bonus", self.above_ma_bonus),
        ];
        if let Some((name, value)) = points
            .iter()
            .find(|(_, value)| !(-MAX_SCORE..=MAX_SCORE).contains(value))
        {
            return Err(Error::InvalidConfiguration(format!(
                "{} must be within -{} and {}, got {}",
                name, MAX_SCORE, MAX_SCORE, value
            )));
        }
        Ok(())
    }
}

/// A signal with the context it was raised in
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ScoredSignal {
    #[serde(flatten)]
    pub signal: Signal,
    pub price_at_signal: ValueType,
    pub macd_line: ValueType,
    pub signal_line: ValueType,
    pub histogram: ValueType,
    pub volume_vs_avg_pct: Option<ValueType>,
    pub confidence: u8,
}

#[derive(Clone, Debug, Default)]
pub struct ConfidenceScorer {
    config: ScoringConfig,
}

impl ConfidenceScorer {
    pub fn try_new(config: ScoringConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score between 0 and 100.
    pub fn score(
        &self,
        kind: SignalKind,
        support: Option<&SupportingPoint>,
        analyst: Option<&AnalystSnapshot>,
    ) -> u8 {
        let config = &self.config;
        let mut score = if kind.is_crossover() {
            config.crossover_score
        } else {
            config.approaching_score
        };

        if let Some(analyst) = analyst {
            if analyst
                .buy_ratio
                .map_or(false, |ratio| ratio > config.buy_ratio_threshold)
            {
                score = score.saturating_add(config.buy_ratio_bonus);
            }
            if analyst
                .upside_to_target_pct
                .map_or(false, |upside| upside > config.upside_threshold_pct)
            {
                score = score.saturating_add(config.upside_bonus);
            }
            match analyst.days_until_earnings {
                Some(days) if days > config.earnings_safe_days => {
                    score = score.saturating_add(config.earnings_safe_bonus)
                }
                Some(days) if days <= config.earnings_imminent_days => {
                    score = score.saturating_add(config.earnings_imminent_penalty)
                }
                _ => {}
            }
        }

        if let Some(support) = support {
            if support.ma_long.map_or(false, |ma| support.close > ma) {
                score = score.saturating_add(config.above_ma_bonus);
            }
            if support
                .volume_avg
                .map_or(false, |avg| avg > 0.0 && support.volume > avg)
            {
                score = score.saturating_add(config.volume_bonus);
            }
        }

        score.clamp(0, MAX_SCORE) as u8
    }

    /// Attach price, MACD values and confidence to each signal.
    ///
    /// `points` and `support` are looked up by date; signals without a MACD point are skipped.
    pub fn score_all(
        &self,
        signals: &[Signal],
        points: &[MacdPoint],
        support: &[SupportingPoint],
        analyst: Option<&AnalystSnapshot>,
    ) -> Vec<ScoredSignal> {
        signals
            .iter()
            .filter_map(|signal| {
                let point = points
                    .binary_search_by_key(&signal.date, |point| point.date)
                    .ok()
                    .map(|idx| &points[idx])?;
                let context = support
                    .binary_search_by_key(&signal.date, |point| point.date)
                    .ok()
                    .map(|idx| &support[idx]);

                Some(ScoredSignal {
                    signal: signal.clone(),
                    price_at_signal: context.map_or(ValueType::NAN, |c| c.close),
                    macd_line: point.macd_line,
                    signal_line: point.signal_line,
                    histogram: point.histogram,
                    volume_vs_avg_pct: context.and_then(volume_vs_avg_pct),
                    confidence: self.score(signal.kind, context, analyst),
                })
            })
            .collect()
    }
}

fn volume_vs_avg_pct(support: &SupportingPoint) -> Option<ValueType> {
    support
        .volume_avg
        .filter(|avg| *avg > 0.0)
        .map(|avg| (support.volume - avg) / avg * 100.0)
}
