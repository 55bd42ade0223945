//! MACD over a short window
//!
//! The fast and slow averages are seeded with simple averages, so the first
//! point is only emitted once the signal average is defined, that is
//! `slow_period + signal_period - 2` values after the first input.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use yata::core::ValueType;

use super::average::Ema;
use crate::error::Error;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MacdPoint {
    pub date: NaiveDate,
    pub macd_line: ValueType,
    pub signal_line: ValueType,
    pub histogram: ValueType,
}

impl PartialEq for MacdPoint {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date
            && self.macd_line.to_bits() == other.macd_line.to_bits()
            && self.signal_line.to_bits() == other.signal_line.to_bits()
            && self.histogram.to_bits() == other.histogram.to_bits()
    }
}

impl Eq for MacdPoint {}

#[derive(Clone, Copy, Debug)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn try_new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, Error> {
        if slow_period <= fast_period {
            return Err(Error::InvalidConfiguration(format!(
                "slow period ({}) must be greater than fast period ({})",
                slow_period, fast_period
            )));
        }

        Ok(Self {
            fast: Ema::try_new(fast_period)?,
            slow: Ema::try_new(slow_period)?,
            signal: Ema::try_new(signal_period)?,
        })
    }

    /// Minimum number of input values accepted by [`Macd::calculate`].
    pub fn min_periods(&self) -> usize {
        self.slow.period() + self.signal.period()
    }

    /// Number of leading input values without a [`MacdPoint`].
    pub fn warmup(&self) -> usize {
        self.slow.period() + self.signal.period() - 2
    }

    pub fn calculate(&self, prices: &[(NaiveDate, ValueType)]) -> Result<Vec<MacdPoint>, Error> {
        if prices.len() < self.min_periods() {
            return Err(Error::InsufficientData {
                required: self.min_periods(),
                got: prices.len(),
            });
        }

        let values: Vec<ValueType> = prices.iter().map(|(_, value)| *value).collect();
        let fast = self.fast.calculate(&values)?;
        let slow = self.slow.calculate(&values)?;

        // fast starts at index fast_period - 1, slow at slow_period - 1
        let offset = self.slow.period() - self.fast.period();
        let macd_line: Vec<ValueType> = slow
            .iter()
            .enumerate()
            .map(|(idx, slow)| fast[idx + offset] - slow)
            .collect();
        let signal_line = self.signal.calculate(&macd_line)?;

        let skip = self.signal.period() - 1;
        Ok(prices[self.warmup()..]
            .iter()
            .zip(macd_line[skip..].iter().zip(signal_line.iter()))
            .map(|((date, _), (macd, signal))| MacdPoint {
                date: *date,
                macd_line: *macd,
                signal_line: *signal,
                histogram: macd - signal,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::day;
    use rstest::*;

    fn series(values: &[f64]) -> Vec<(NaiveDate, f64)> {
        values
            .iter()
            .enumerate()
            .map(|(idx, value)| (day(idx as i64), *value))
            .collect()
    }

    #[rstest]
    #[case::zero_fast(0, 3, 2)]
    #[case::zero_signal(2, 3, 0)]
    #[case::slow_equals_fast(3, 3, 2)]
    #[case::slow_below_fast(4, 3, 2)]
    fn test_invalid_configuration(#[case] fast: usize, #[case] slow: usize, #[case] signal: usize) {
        assert!(matches!(
            Macd::try_new(fast, slow, signal),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[rstest]
    fn test_insufficient_data() {
        let macd = Macd::try_new(2, 3, 2).unwrap();
        assert!(matches!(
            macd.calculate(&series(&[1.0, 2.0, 3.0, 4.0])),
            Err(Error::InsufficientData {
                required: 5,
                got: 4
            })
        ));
    }

    #[rstest]
    #[case::minimum(5, 2)]
    #[case::longer(12, 9)]
    fn test_length(#[case] size: usize, #[case] expected: usize) {
        let macd = Macd::try_new(2, 3, 2).unwrap();
        let values: Vec<f64> = (0..size).map(|x| (x * x) as f64).collect();
        let points = macd.calculate(&series(&values)).unwrap();

        assert_eq!(points.len(), expected);
        assert_eq!(points.len(), size - macd.warmup());
        assert_eq!(points[0].date, day(macd.warmup() as i64));
        assert_eq!(points.last().unwrap().date, day(size as i64 - 1));
    }

    #[rstest]
    fn test_values() {
        // fast: alpha 2/3, seed mean(1, 2)
        // slow: alpha 1/2, seed mean(1, 2, 3)
        // signal: alpha 2/3, seed mean of the first two macd values
        let macd = Macd::try_new(2, 3, 2).unwrap();
        let points = macd.calculate(&series(&[1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();

        let fast = [1.5, 1.5 / 3.0 + 2.0, (1.5 / 3.0 + 2.0) / 3.0 + 8.0 / 3.0];
        let fast = [fast[0], fast[1], fast[2], fast[2] / 3.0 + 10.0 / 3.0];
        let slow = [2.0, 3.0, 4.0];
        let macd_line = [fast[1] - slow[0], fast[2] - slow[1], fast[3] - slow[2]];
        let seed = (macd_line[0] + macd_line[1]) / 2.0;
        let signal = macd_line[2] * (2.0 / 3.0) + seed * (1.0 - 2.0 / 3.0);

        assert_eq!(points.len(), 2);
        assert!((points[0].macd_line - macd_line[1]).abs() < 1e-12);
        assert!((points[0].signal_line - seed).abs() < 1e-12);
        assert!((points[1].macd_line - macd_line[2]).abs() < 1e-12);
        assert!((points[1].signal_line - signal).abs() < 1e-12);
        assert!((points[1].histogram - (macd_line[2] - signal)).abs() < 1e-12);
    }

    #[rstest]
    fn test_flat_series() {
        let macd = Macd::try_new(5, 11, 4).unwrap();
        let points = macd.calculate(&series(&[42.0; 30])).unwrap();

        assert_eq!(points.len(), 30 - macd.warmup());
        assert!(points.iter().all(|p| p.macd_line.abs() < 1e-9
            && p.signal_line.abs() < 1e-9
            && p.histogram.abs() < 1e-9));
    }

    #[rstest]
    fn test_deterministic() {
        let macd = Macd::try_new(5, 11, 4).unwrap();
        let values: Vec<f64> = (0..60).map(|x| 100.0 + (x as f64 * 0.7).sin() * 5.0).collect();

        assert_eq!(
            macd.calculate(&series(&values)).unwrap(),
            macd.calculate(&series(&values)).unwrap()
        );
    }
}
