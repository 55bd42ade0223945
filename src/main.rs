use async_trait::async_trait;
use chrono::Local;
use enum_dispatch::enum_dispatch;
use env_logger::Builder;
use log::LevelFilter;
use macd_alert::{
    error::Error,
    exporter::Exporter,
    pipeline::{PipelineConfig, PriceSource},
};
use std::{io::Write, path::PathBuf, str::FromStr};
use structopt::StructOpt;

const LOG_LEVEL: &str = "LOG_LEVEL";
const PKG_NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "macd-alert", about = "Heikin Ashi and MACD stock alerts cli.")]
struct MainCommand {
    #[structopt(
        long = "log-level",
        help = "Minimum level of the logs.",
        env = LOG_LEVEL,
        default_value = "info"
    )]
    pub log_level: LevelFilter,
    #[structopt(subcommand)]
    command: Command,
}

#[async_trait]
#[enum_dispatch]
trait Execute {
    async fn execute(&self) -> Result<(), Error>;
}

#[derive(Clone, Debug, StructOpt)]
#[enum_dispatch(Execute)]
enum Command {
    Run(RunCommand),
    Validate(ValidateCommand),
}

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "validate", about = "Validate a configuration.")]
struct ValidateCommand {
    #[structopt(
        long = "config",
        short = "c",
        help = "Path to the configuration to validate."
    )]
    pub configuration_path: PathBuf,
    #[structopt(long = "show", help = "Print the validated configuration.")]
    pub show: bool,
}

#[async_trait]
impl Execute for ValidateCommand {
    async fn execute(&self) -> Result<(), Error> {
        let config = PipelineConfig::try_from(self.configuration_path.clone())?.validate()?;
        config.pipeline()?;

        if self.show {
            log::info!("{:#?}", config);
        };
        log::info!(
            "{} is valid, {} tickers configured",
            self.configuration_path.display(),
            config.tickers.len()
        );
        Ok(())
    }
}

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "run", about = "Detect signals for every configured ticker.")]
struct RunCommand {
    #[structopt(
        short = "c",
        long = "config",
        help = "Configuration path for the tickers and indicators."
    )]
    pub configuration_path: PathBuf,
    #[structopt(
        long = "price-source",
        help = "Override the MACD price source (raw_close or heikin_ashi_close)."
    )]
    pub price_source: Option<String>,
    #[structopt(long = "signals-only", help = "Never export the charting series.")]
    pub signals_only: bool,
}

#[async_trait]
impl Execute for RunCommand {
    async fn execute(&self) -> Result<(), Error> {
        log::info!("Start {}!", PKG_NAME);

        // Read configuration from file
        let mut pipeline_configuration =
            PipelineConfig::try_from(self.configuration_path.clone())?.validate()?;
        if let Some(price_source) = &self.price_source {
            pipeline_configuration.strategy.price_source = PriceSource::from_str(price_source)?;
        }

        let with_series = pipeline_configuration.with_series(self.signals_only);
        let report = pipeline_configuration.run(with_series).await?;
        log::info!(
            "{} signals over {} tickers, {} failed",
            report.signal_count(),
            report.tickers.len(),
            report.failures.len()
        );

        pipeline_configuration.exporter.export(&report).await
    }
}

#[tokio::main]
async fn run_app() -> Result<(), Error> {
    let opt = MainCommand::from_args();
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .filter(None, opt.log_level)
        .init();
    opt.command.execute().await
}

fn main() {
    std::process::exit(match run_app() {
        Ok(_) => 0,
        Err(err) => {
            log::error!("error: {:?}", err);
            1
        }
    });
}
