use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum ExchangeError {
    #[display("request to {endpoint} failed")]
    Request { endpoint: String },
    #[display("failed to parse response from {endpoint}")]
    ResponseParse { endpoint: String },
    #[display("{endpoint} returned an error: {message}")]
    Upstream { endpoint: String, message: String },
}

/// Failure while turning a time range into a per-period price series.
#[derive(Debug, Display, Error, PartialEq)]
pub enum AggregationError {
    #[display("invalid input: {reason}")]
    InvalidInput { reason: String },
    #[display("quote source failed for window {window}")]
    Source { window: usize },
    #[display("no close prices in window {window}")]
    EmptyWindow { window: usize },
    #[display("aggregation cancelled")]
    Cancelled,
}

/// Operation tag wrapping an aggregation failure.
#[derive(Debug, Display, Error, PartialEq)]
pub enum IndicatorError {
    #[display("failed to compute SMA")]
    Sma,
    #[display("failed to compute EMA")]
    Ema,
}
