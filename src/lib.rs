//! Daily stock alerts built on Heikin Ashi candles and a short window MACD.
//!
//! A run goes through:
//! * the loader, reading the daily bars of each ticker
//! * the Heikin Ashi transformation and the MACD calculation
//! * the signal detector, raising crossover and approaching signals
//!   confirmed by the candle direction
//! * the confidence scorer, weighting signals with volume, trend and analyst context
//! * an exporter writing the report

#[macro_use]
extern crate lazy_static;
extern crate log;
extern crate strum;
extern crate strum_macros;

pub mod error;
pub mod exporter;
pub mod loader;
pub mod pipeline;
pub mod record;
pub mod technical_analysis;
mod utils;
