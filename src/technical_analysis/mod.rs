mod average;
mod heikin_ashi;
mod macd;
mod scoring;
mod signal;

pub use average::{rolling_mean, Ema};
pub use heikin_ashi::{transform, HeikinAshiCandle};
pub use macd::{Macd, MacdPoint};
pub use scoring::{
    supporting_series, AnalystSnapshot, ConfidenceScorer, ScoredSignal, ScoringConfig,
    SupportingPoint,
};
pub use signal::{
    check_alignment, suppress_duplicates, DetectorConfig, Signal, SignalDetector, SignalKind,
};
