//! Read configuration and bar files from disk

use serde::de::DeserializeOwned;
use std::{fs::File, io::BufReader, path::Path};

use crate::{
    error::Error,
    record::{validate_series, Bar},
};

/// Deserialize a `.json`, `.yaml` or `.yml` file.
pub fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    log::debug!("use path {}", path.display());

    let extension = path
        .extension()
        .and_then(|os_str| os_str.to_str())
        .ok_or_else(|| Error::Config(path.display().to_string()))?;

    let reader = BufReader::new(File::open(path)?);

    match extension {
        "json" => serde_json::from_reader(reader).map_err(Error::from),
        "yaml" | "yml" => serde_yaml::from_reader(reader).map_err(Error::from),
        _ => Err(Error::Config(format!(
            "{}: invalid extension",
            path.display()
        ))),
    }
}

/// Load the bars of one ticker, keeping file order.
pub fn load_bars(ticker: &str, path: &Path) -> Result<Vec<Bar>, Error> {
    let bars: Vec<Bar> = read_file(path)?;
    validate_series(ticker, &bars)?;

    log::debug!(
        "{}: loaded {} bars from {}",
        ticker,
        bars.len(),
        path.display()
    );
    Ok(bars)
}
