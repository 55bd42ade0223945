use chrono::NaiveDate;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Serde failed: {}", .source)]
    SerdeJson {
        #[from]
        source: serde_json::Error,
    },
    #[error("Deserilaze failed: {}", .source)]
    SerdeYaml {
        #[from]
        source: serde_yaml::Error,
    },
    #[error("IO failure: {}", .source)]
    IO {
        #[from]
        source: std::io::Error,
    },
    #[error("Strum failed: {}", .source)]
    Parse {
        #[from]
        source: strum::ParseError,
    },
    #[error("Ticker task failed: {}", .source)]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
    /// Not enough history for the requested windows
    #[error("Insufficient data: {required} points required, got {got}")]
    InsufficientData { required: usize, got: usize },
    /// Derived series lengths or dates disagree
    #[error("Series are not aligned: {0}")]
    AlignmentMismatch(String),
    /// Non-positive periods, slow period not above fast period, ...
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Bars of {ticker} are not strictly ascending at {date}")]
    UnorderedBars { ticker: String, date: NaiveDate },
    #[error("Expected bars of {expected}, found {found}")]
    TickerMismatch { expected: String, found: String },
    #[error("Invalid ticker symbol: {0:?}")]
    InvalidTicker(String),
    /// Error returned when a file cannot be loaded
    #[error("Failed to load {0}")]
    Config(String),
}
