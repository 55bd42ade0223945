use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use strum_macros::{Display, EnumString};
use tokio::task;
use yata::core::{ValueType, OHLCV};

use crate::{
    error::Error,
    exporter::{Exporter, PipelineExporterConfig, Report, TickerFailure},
    loader::{load_bars, read_file},
    record::{normalize_ticker, validate_series, Bar},
    technical_analysis::{
        suppress_duplicates, supporting_series, transform, AnalystSnapshot, ConfidenceScorer,
        DetectorConfig, HeikinAshiCandle, Macd, MacdPoint, ScoredSignal, ScoringConfig, Signal,
        SignalDetector, SupportingPoint,
    },
};

const DEFAULT_FAST_PERIOD: usize = 5;
const DEFAULT_SLOW_PERIOD: usize = 11;
const DEFAULT_SIGNAL_PERIOD: usize = 4;
const DEFAULT_LOOKBACK_DAYS: usize = 126;

/// Price fed to the MACD calculator
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PriceSource {
    RawClose,
    #[default]
    HeikinAshiClose,
}

fn default_fast_period() -> usize {
    DEFAULT_FAST_PERIOD
}

fn default_slow_period() -> usize {
    DEFAULT_SLOW_PERIOD
}

fn default_signal_period() -> usize {
    DEFAULT_SIGNAL_PERIOD
}

fn default_lookback_days() -> Option<usize> {
    Some(DEFAULT_LOOKBACK_DAYS)
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StrategyConfig {
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,
    #[serde(default = "default_signal_period")]
    pub signal_period: usize,
    #[serde(default)]
    pub price_source: PriceSource,
    /// Most recent trading days kept before computing, every bar when empty
    #[serde(default = "default_lookback_days")]
    pub lookback_days: Option<usize>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            fast_period: DEFAULT_FAST_PERIOD,
            slow_period: DEFAULT_SLOW_PERIOD,
            signal_period: DEFAULT_SIGNAL_PERIOD,
            price_source: PriceSource::default(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl StrategyConfig {
    pub fn macd(&self) -> Result<Macd, Error> {
        Macd::try_new(self.fast_period, self.slow_period, self.signal_period)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let macd = self.macd()?;

        match self.lookback_days {
            Some(days) if days < macd.min_periods() => Err(Error::InvalidConfiguration(format!(
                "lookback_days ({}) must cover at least {} trading days",
                days,
                macd.min_periods()
            ))),
            _ => Ok(()),
        }
    }
}

/// Everything computed for one ticker
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TickerReport {
    pub ticker: String,
    pub signals: Vec<Signal>,
    pub scored: Vec<ScoredSignal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candles: Vec<HeikinAshiCandle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub macd: Vec<MacdPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supporting: Vec<SupportingPoint>,
}

impl TickerReport {
    /// Drop the charting series and keep the signals.
    pub fn without_series(self) -> Self {
        Self {
            candles: vec![],
            macd: vec![],
            supporting: vec![],
            ..self
        }
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.candles.last().map(|candle| candle.date)
    }
}

/// Loader → Heikin Ashi → MACD → detector → scorer, for one ticker at a time
#[derive(Clone, Debug)]
pub struct Pipeline {
    strategy: StrategyConfig,
    macd: Macd,
    detector: SignalDetector,
    scorer: ConfidenceScorer,
}

impl Pipeline {
    pub fn try_new(
        strategy: StrategyConfig,
        detector: DetectorConfig,
        scoring: ScoringConfig,
    ) -> Result<Self, Error> {
        strategy.validate()?;

        Ok(Self {
            macd: strategy.macd()?,
            strategy,
            detector: SignalDetector::try_new(detector)?,
            scorer: ConfidenceScorer::try_new(scoring)?,
        })
    }

    pub fn strategy(&self) -> &StrategyConfig {
        &self.strategy
    }

    pub fn run(
        &self,
        ticker: &str,
        bars: &[Bar],
        analyst: Option<&AnalystSnapshot>,
    ) -> Result<TickerReport, Error> {
        validate_series(ticker, bars)?;

        let bars = match self.strategy.lookback_days {
            Some(days) if bars.len() > days => &bars[bars.len() - days..],
            _ => bars,
        };

        let candles = transform(bars)?;

        let prices: Vec<(NaiveDate, ValueType)> = match self.strategy.price_source {
            PriceSource::RawClose => bars.iter().map(|bar| (bar.date, bar.close())).collect(),
            PriceSource::HeikinAshiClose => candles
                .iter()
                .map(|candle| (candle.date, candle.close))
                .collect(),
        };

        let points = self.macd.calculate(&prices)?;
        let aligned = &candles[candles.len() - points.len()..];
        log::debug!(
            "{}: {} bars, {} candles, {} MACD points",
            ticker,
            bars.len(),
            candles.len(),
            points.len()
        );

        let signals = self.detector.detect(ticker, aligned, &points)?;
        let signals = suppress_duplicates(signals, self.detector.config().cooldown_days);

        let scoring = self.scorer.config();
        let supporting = supporting_series(bars, scoring.ma_period, scoring.volume_period);
        let scored = self
            .scorer
            .score_all(&signals, &points, &supporting, analyst);

        Ok(TickerReport {
            ticker: ticker.to_string(),
            signals,
            scored,
            candles,
            macd: points,
            supporting,
        })
    }
}

/// A ticker and where its bars are stored
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TickerConfig {
    pub ticker: String,
    pub bars: PathBuf,
    #[serde(default)]
    pub analyst: Option<AnalystSnapshot>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default, alias = "indicator")]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub tickers: Vec<TickerConfig>,
    #[serde(default)]
    pub exporter: PipelineExporterConfig,
}

impl PipelineConfig {
    pub fn try_from(path: PathBuf) -> Result<Self, Error> {
        log::info!("Retrieve config from local file.");

        let mut config: PipelineConfig = read_file(&path)?;

        // bar files and the report file are relative to the configuration file
        if let Some(parent) = path.parent() {
            for ticker in config.tickers.iter_mut() {
                if ticker.bars.is_relative() {
                    ticker.bars = parent.join(&ticker.bars);
                }
            }
            if let PipelineExporterConfig::File(exporter) = &mut config.exporter {
                if exporter.path.is_relative() {
                    exporter.path = parent.join(&exporter.path);
                }
            }
        }

        Ok(config)
    }

    /// Check every section and normalise ticker symbols.
    pub fn validate(mut self) -> Result<Self, Error> {
        self.strategy.validate()?;
        self.detector.validate()?;
        self.scoring.validate()?;

        for ticker in self.tickers.iter_mut() {
            ticker.ticker = normalize_ticker(&ticker.ticker)?;
        }

        Ok(self)
    }

    pub fn pipeline(&self) -> Result<Pipeline, Error> {
        Pipeline::try_new(
            self.strategy.clone(),
            self.detector.clone(),
            self.scoring.clone(),
        )
    }

    /// Whether the report should carry the charting series.
    pub fn with_series(&self, signals_only: bool) -> bool {
        self.exporter.include_series() && !signals_only
    }

    /// Run every ticker independently, a failing ticker is reported and skipped.
    pub async fn run(&self, with_series: bool) -> Result<Report, Error> {
        let pipeline = self.pipeline()?;
        log::info!(
            "Run {} tickers on {} prices",
            self.tickers.len(),
            pipeline.strategy().price_source
        );

        Ok(self
            .run_with(with_series, move |config| {
                let bars = load_bars(&config.ticker, &config.bars)?;
                pipeline.run(&config.ticker, &bars, config.analyst.as_ref())
            })
            .await)
    }

    async fn run_with<F>(&self, with_series: bool, process: F) -> Report
    where
        F: Fn(TickerConfig) -> Result<TickerReport, Error> + Send + Sync + 'static,
    {
        let process = Arc::new(process);
        let handles = self.tickers.iter().cloned().map(|config| {
            let process = process.clone();
            task::spawn_blocking(move || process(config))
        });

        let mut report = Report::default();
        for (config, result) in self.tickers.iter().zip(join_all(handles).await) {
            let ticker = config.ticker.clone();
            // a panicking task only fails its own ticker
            match result.map_err(Error::from).and_then(|outcome| outcome) {
                Ok(ticker_report) => {
                    log::info!(
                        "{}: {} signals ({} scored) up to {}",
                        ticker,
                        ticker_report.signals.len(),
                        ticker_report.scored.len(),
                        ticker_report
                            .last_date()
                            .map_or_else(|| "-".to_string(), |date| date.to_string())
                    );
                    report.tickers.push(if with_series {
                        ticker_report
                    } else {
                        ticker_report.without_series()
                    });
                }
                Err(error) => {
                    log::warn!("{}: skipped: {}", ticker, error);
                    report.failures.push(TickerFailure {
                        ticker,
                        error: error.to_string(),
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::day;
    use crate::technical_analysis::SignalKind;
    use rstest::*;
    use std::{io::Write, str::FromStr};
    use tempfile::TempDir;

    fn bar(offset: i64, open: f64, close: f64) -> Bar {
        Bar::new(
            "AAPL",
            day(offset),
            open,
            open.max(close) + 0.5,
            open.min(close) - 0.5,
            close,
            1000.0 + offset as f64,
        )
    }

    /// Flat, then a decline, then a rally opening with a gap on day 30.
    #[fixture]
    fn bars() -> Vec<Bar> {
        let mut closes: Vec<f64> = vec![100.0; 20];
        closes.extend((1..=10).map(|x| 100.0 - 2.0 * x as f64));
        closes.extend((0..15).map(|x| 95.0 + 3.0 * x as f64));
        closes.extend(vec![137.0; 10]);

        closes
            .iter()
            .enumerate()
            .map(|(idx, close)| {
                let open = if idx == 0 { *close } else { closes[idx - 1] };
                bar(idx as i64, open, *close)
            })
            .collect()
    }

    #[fixture]
    fn pipeline() -> Pipeline {
        Pipeline::try_new(
            StrategyConfig {
                lookback_days: None,
                ..Default::default()
            },
            DetectorConfig::default(),
            ScoringConfig::default(),
        )
        .unwrap()
    }

    #[rstest]
    fn test_lengths(pipeline: Pipeline, bars: Vec<Bar>) {
        let report = pipeline.run("AAPL", &bars, None).unwrap();
        let strategy = pipeline.strategy();

        assert_eq!(report.candles.len(), bars.len());
        assert_eq!(report.supporting.len(), bars.len());
        assert_eq!(
            report.macd.len(),
            bars.len() - (strategy.slow_period + strategy.signal_period - 2)
        );
        assert_eq!(report.last_date(), Some(day(bars.len() as i64 - 1)));
    }

    #[rstest]
    fn test_deterministic(pipeline: Pipeline, bars: Vec<Bar>) {
        assert_eq!(
            pipeline.run("AAPL", &bars, None).unwrap(),
            pipeline.run("AAPL", &bars, None).unwrap()
        );
    }

    #[rstest]
    #[case::heikin_ashi(PriceSource::HeikinAshiClose)]
    #[case::raw_close(PriceSource::RawClose)]
    fn test_signals_follow_rule(bars: Vec<Bar>, #[case] price_source: PriceSource) {
        let pipeline = Pipeline::try_new(
            StrategyConfig {
                price_source,
                lookback_days: None,
                ..Default::default()
            },
            DetectorConfig::default(),
            ScoringConfig::default(),
        )
        .unwrap();
        let report = pipeline.run("AAPL", &bars, None).unwrap();

        let buys: Vec<&Signal> = report
            .signals
            .iter()
            .filter(|s| s.kind == SignalKind::Buy)
            .collect();
        assert_eq!(buys.len(), 1);

        for signal in report.signals.iter() {
            let idx = report
                .macd
                .iter()
                .position(|p| p.date == signal.date)
                .expect("signal without MACD point");
            let candle = report
                .candles
                .iter()
                .find(|c| c.date == signal.date)
                .unwrap();
            assert!(candle.is_bullish());
            assert!(idx > 0);

            let (previous, current) = (report.macd[idx - 1].histogram, report.macd[idx].histogram);
            match signal.kind {
                SignalKind::Buy => assert!(previous <= 0.0 && current > 0.0),
                SignalKind::ApproachingBuy => assert!(previous < current && current < 0.0),
                _ => unreachable!(),
            }
        }

        assert_eq!(buys[0].date, day(30));
        assert_eq!(report.scored.len(), report.signals.len());
    }

    #[rstest]
    fn test_flat_series_has_no_signal(pipeline: Pipeline) {
        let bars: Vec<Bar> = (0..40).map(|x| bar(x, 50.0, 50.0)).collect();
        let report = pipeline.run("AAPL", &bars, None).unwrap();

        assert!(report.signals.is_empty());
    }

    #[rstest]
    fn test_insufficient_data(pipeline: Pipeline, bars: Vec<Bar>) {
        let strategy = pipeline.strategy();
        let size = strategy.slow_period + strategy.signal_period - 1;

        assert!(matches!(
            pipeline.run("AAPL", &bars[..size], None),
            Err(Error::InsufficientData { .. })
        ));
        assert!(pipeline.run("AAPL", &bars[..size + 1], None).is_ok());
    }

    #[rstest]
    fn test_empty(pipeline: Pipeline) {
        assert!(matches!(
            pipeline.run("AAPL", &[], None),
            Err(Error::InsufficientData { .. })
        ));
    }

    #[rstest]
    fn test_unordered(pipeline: Pipeline, mut bars: Vec<Bar>) {
        bars.swap(3, 4);
        assert!(matches!(
            pipeline.run("AAPL", &bars, None),
            Err(Error::UnorderedBars { .. })
        ));
    }

    #[rstest]
    fn test_lookback(bars: Vec<Bar>) {
        let pipeline = Pipeline::try_new(
            StrategyConfig {
                lookback_days: Some(30),
                ..Default::default()
            },
            DetectorConfig::default(),
            ScoringConfig::default(),
        )
        .unwrap();
        let report = pipeline.run("AAPL", &bars, None).unwrap();

        assert_eq!(report.candles.len(), 30);
        assert_eq!(report.candles[0].date, bars[bars.len() - 30].date);
    }

    #[rstest]
    #[case::slow_below_fast(StrategyConfig { fast_period: 12, slow_period: 6, ..Default::default() })]
    #[case::zero_signal(StrategyConfig { signal_period: 0, ..Default::default() })]
    #[case::short_lookback(StrategyConfig { lookback_days: Some(10), ..Default::default() })]
    fn test_invalid_strategy(#[case] strategy: StrategyConfig) {
        assert!(matches!(
            Pipeline::try_new(strategy, DetectorConfig::default(), ScoringConfig::default()),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[rstest]
    #[case::raw("raw_close", PriceSource::RawClose)]
    #[case::heikin_ashi("heikin_ashi_close", PriceSource::HeikinAshiClose)]
    fn test_price_source(#[case] name: &'static str, #[case] expected: PriceSource) {
        assert_eq!(PriceSource::from_str(name).unwrap(), expected);
        assert_eq!(
            serde_yaml::from_str::<PriceSource>(name).unwrap(),
            expected
        );
    }

    #[fixture]
    fn configuration_data() -> &'static str {
        r#"
        indicator:
          fast_period: 5
          slow_period: 11
          signal_period: 4
          price_source: raw_close
          lookback_days: 60
        detector:
          approaching_points: 3
          detect_sell: true
          cooldown_days: 3
        scoring:
          ma_period: 20
        tickers:
          - ticker: aapl
            bars: aapl.json
            analyst:
              days_until_earnings: 30
              buy_ratio: 0.75
          - ticker: MSFT
            bars: /data/msft.yaml
        exporter:
          type: file
          path: report.json
          pretty: true
        "#
    }

    #[rstest]
    fn test_configuration(configuration_data: &str) {
        let configuration = serde_yaml::from_str::<PipelineConfig>(configuration_data)
            .unwrap()
            .validate()
            .unwrap();

        assert_eq!(configuration.strategy.price_source, PriceSource::RawClose);
        assert_eq!(configuration.strategy.lookback_days, Some(60));
        assert_eq!(configuration.detector.approaching_points, 3);
        assert_eq!(configuration.scoring.ma_period, 20);
        assert_eq!(configuration.scoring.volume_period, 5);
        assert_eq!(configuration.tickers[0].ticker, "AAPL");
        assert_eq!(
            configuration.tickers[0].analyst.as_ref().unwrap().buy_ratio,
            Some(0.75)
        );
        assert!(matches!(
            configuration.exporter,
            PipelineExporterConfig::File(_)
        ));
    }

    #[rstest]
    fn test_default_configuration() {
        let configuration = serde_json::from_str::<PipelineConfig>("{}").unwrap();

        assert_eq!(configuration.strategy.fast_period, 5);
        assert_eq!(configuration.strategy.slow_period, 11);
        assert_eq!(configuration.strategy.signal_period, 4);
        assert_eq!(
            configuration.strategy.price_source,
            PriceSource::HeikinAshiClose
        );
        assert!(configuration.tickers.is_empty());
        assert!(configuration.validate().is_ok());
    }

    #[rstest]
    fn test_invalid_ticker(configuration_data: &str) {
        let mut configuration = serde_yaml::from_str::<PipelineConfig>(configuration_data).unwrap();
        configuration.tickers[1].ticker = "not a ticker".to_string();

        assert!(matches!(
            configuration.validate(),
            Err(Error::InvalidTicker(_))
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn test_run_isolates_failures(bars: Vec<Bar>) {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("aapl.json")).unwrap();
        file.write_all(serde_json::to_string(&bars).unwrap().as_bytes())
            .unwrap();

        let config_path = dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            r#"
            tickers:
              - ticker: AAPL
                bars: aapl.json
              - ticker: MSFT
                bars: msft.json
            "#,
        )
        .unwrap();

        let configuration = PipelineConfig::try_from(config_path)
            .unwrap()
            .validate()
            .unwrap();
        let report = configuration.run(false).await.unwrap();

        assert_eq!(report.tickers.len(), 1);
        assert_eq!(report.tickers[0].ticker, "AAPL");
        assert!(report.tickers[0].candles.is_empty());
        assert!(!report.tickers[0].signals.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].ticker, "MSFT");
    }

    #[rstest]
    #[tokio::test]
    async fn test_run_isolates_panics() {
        let configuration = serde_yaml::from_str::<PipelineConfig>(
            r#"
            tickers:
              - ticker: AAPL
                bars: aapl.json
              - ticker: MSFT
                bars: msft.json
            "#,
        )
        .unwrap();

        let report = configuration
            .run_with(false, |config| {
                if config.ticker == "AAPL" {
                    panic!("scoring failed");
                }
                let bars: Vec<Bar> = (0..40)
                    .map(|x| Bar {
                        ticker: config.ticker.clone(),
                        ..bar(x, 50.0, 50.0 + x as f64)
                    })
                    .collect();
                Pipeline::try_new(
                    StrategyConfig::default(),
                    DetectorConfig::default(),
                    ScoringConfig::default(),
                )?
                .run(&config.ticker, &bars, None)
            })
            .await;

        assert_eq!(report.tickers.len(), 1);
        assert_eq!(report.tickers[0].ticker, "MSFT");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].ticker, "AAPL");
        assert!(report.failures[0].error.contains("Ticker task failed"));
    }
}
