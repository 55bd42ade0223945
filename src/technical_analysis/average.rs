//! Moving averages shared by the MACD calculator and the supporting indicators.

use yata::core::ValueType;

use crate::error::Error;

/// Simple mean of a window.
#[inline]
pub fn mean(window: &[ValueType]) -> ValueType {
    window.iter().sum::<ValueType>() / window.len() as ValueType
}

/// Rolling simple moving average, `None` until `period` values are available.
pub fn rolling_mean(values: &[ValueType], period: usize) -> Vec<Option<ValueType>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|idx| (idx + 1 >= period).then(|| mean(&values[idx + 1 - period..=idx])))
        .collect()
}

/// Exponential moving average seeded with the simple average of its first window.
#[derive(Clone, Copy, Debug)]
pub struct Ema {
    period: usize,
    alpha: ValueType,
}

impl Ema {
    pub fn try_new(period: usize) -> Result<Self, Error> {
        if period == 0 {
            return Err(Error::InvalidConfiguration(
                "moving average period must be positive".to_string(),
            ));
        }

        Ok(Self {
            period,
            alpha: 2.0 / (period as ValueType + 1.0),
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Values from index `period - 1` onwards; the output is `period - 1` shorter
    /// than the input.
    pub fn calculate(&self, values: &[ValueType]) -> Result<Vec<ValueType>, Error> {
        if values.len() < self.period {
            return Err(Error::InsufficientData {
                required: self.period,
                got: values.len(),
            });
        }

        let seed = mean(&values[..self.period]);
        let mut result = Vec::with_capacity(values.len() + 1 - self.period);
        result.push(seed);

        values[self.period..].iter().fold(seed, |previous, value| {
            let ema = value * self.alpha + previous * (1.0 - self.alpha);
            result.push(ema);
            ema
        });

        Ok(result)
    }
}
