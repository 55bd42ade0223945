use async_trait::async_trait;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::{fs, io::AsyncWriteExt};

use crate::{error::Error, pipeline::TickerReport};

/// A ticker whose bars could not be processed
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TickerFailure {
    pub ticker: String,
    pub error: String,
}

/// Outcome of a run over every configured ticker
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Report {
    pub tickers: Vec<TickerReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<TickerFailure>,
}

impl Report {
    pub fn signal_count(&self) -> usize {
        self.tickers.iter().map(|ticker| ticker.signals.len()).sum()
    }

    fn to_json(&self, pretty: bool) -> Result<String, Error> {
        let content = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(content)
    }
}

/// Write a report somewhere
#[async_trait]
#[enum_dispatch]
pub trait Exporter {
    /// Whether the charting series are worth computing for this destination
    fn include_series(&self) -> bool;

    async fn export(&self, report: &Report) -> Result<(), Error>;
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StdoutExporter {
    #[serde(default)]
    pub pretty: bool,
}

#[async_trait]
impl Exporter for StdoutExporter {
    fn include_series(&self) -> bool {
        false
    }

    async fn export(&self, report: &Report) -> Result<(), Error> {
        let mut content = report.to_json(self.pretty)?;
        content.push('\n');

        let mut stdout = tokio::io::stdout();
        stdout.write_all(content.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FileExporter {
    pub path: PathBuf,
    #[serde(default)]
    pub pretty: bool,
    /// Also write candles, MACD points and supporting indicators for charting
    #[serde(default)]
    pub include_series: bool,
}

#[async_trait]
impl Exporter for FileExporter {
    fn include_series(&self) -> bool {
        self.include_series
    }

    async fn export(&self, report: &Report) -> Result<(), Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, report.to_json(self.pretty)?).await?;

        log::info!(
            "{} signals exported to {}",
            report.signal_count(),
            self.path.display()
        );
        Ok(())
    }
}

#[enum_dispatch(Exporter)]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum PipelineExporterConfig {
    #[serde(rename = "stdout")]
    Stdout(StdoutExporter),
    #[serde(rename = "file")]
    File(FileExporter),
}

impl Default for PipelineExporterConfig {
    fn default() -> Self {
        PipelineExporterConfig::Stdout(StdoutExporter::default())
    }
}
