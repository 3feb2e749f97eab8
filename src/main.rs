mod config;
mod error;
mod exchange;
mod indicator;
mod model;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use clap::{Args, Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{AppConfig, IndicatorConfig};
use exchange::Exchange;
use exchange::exmo::ExmoExchange;
use indicator::{IndicatorEngine, QuoteSource};

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("exchange error")]
    Exchange,
    #[display("indicator error")]
    Indicator,
    #[display("output error")]
    Output,
}

#[derive(Parser)]
#[command(
    name = "exmo-indicators",
    about = "EXMO public market data with SMA/EMA over historical close prices"
)]
struct Cli {
    /// Path to a TOML configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Latest statistics for every pair
    Ticker,
    /// Recent deals for the given pairs
    Trades {
        #[arg(required = true)]
        pairs: Vec<String>,
    },
    /// Order book for the given pairs
    OrderBook {
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
        #[arg(required = true)]
        pairs: Vec<String>,
    },
    /// Listed currency codes
    Currencies,
    /// Candles for a pair over the last `--hours`
    Candles {
        pair: String,
        #[arg(short, long)]
        resolution: Option<u32>,
        #[arg(long)]
        hours: Option<u32>,
    },
    /// Cumulative simple moving average of per-period mean close prices
    Sma(IndicatorArgs),
    /// Exponential blend of per-period mean close prices
    Ema(IndicatorArgs),
}

#[derive(Args)]
struct IndicatorArgs {
    /// Trading pair, e.g. BTC_USD
    pair: Option<String>,
    /// Candle resolution passed to the exchange
    #[arg(short, long)]
    limit: Option<u32>,
    /// Number of equal windows the lookback is split into
    #[arg(short, long)]
    period: Option<usize>,
    /// Lookback ending now, in hours
    #[arg(long)]
    hours: Option<u32>,
}

/// Indicator request with CLI overrides applied on top of config defaults.
struct IndicatorRequest {
    pair: String,
    limit: u32,
    period: usize,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl IndicatorRequest {
    fn resolve(args: IndicatorArgs, defaults: &IndicatorConfig, now: DateTime<Utc>) -> Self {
        let hours = args.hours.unwrap_or(defaults.lookback_hours);
        Self {
            pair: args.pair.unwrap_or_else(|| defaults.pair.clone()),
            limit: args.limit.unwrap_or(defaults.limit),
            period: args.period.unwrap_or(defaults.period),
            from: now - TimeDelta::hours(i64::from(hours)),
            to: now,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load_or_default(cli.config.as_deref().map(Path::new))
        .change_context(AppError::Config)?;

    init_tracing(&config);

    let exmo = Arc::new(ExmoExchange::from_config(&config.exmo).change_context(AppError::Exchange)?);

    match cli.command {
        Command::Ticker => print_json(&exmo.ticker().await.change_context(AppError::Exchange)?),
        Command::Trades { pairs } => {
            print_json(&exmo.trades(&pairs).await.change_context(AppError::Exchange)?)
        }
        Command::OrderBook { limit, pairs } => print_json(
            &exmo
                .order_book(limit, &pairs)
                .await
                .change_context(AppError::Exchange)?,
        ),
        Command::Currencies => {
            print_json(&exmo.currencies().await.change_context(AppError::Exchange)?)
        }
        Command::Candles {
            pair,
            resolution,
            hours,
        } => {
            let to = Utc::now();
            let hours = hours.unwrap_or(config.indicator.lookback_hours);
            let from = to - TimeDelta::hours(i64::from(hours));
            let resolution = resolution.unwrap_or(config.indicator.limit);
            print_json(
                &exmo
                    .candles_history(&pair, resolution, from, to)
                    .await
                    .change_context(AppError::Exchange)?,
            )
        }
        Command::Sma(args) => {
            let request = IndicatorRequest::resolve(args, &config.indicator, Utc::now());
            let engine = build_engine(exmo, &config);
            let values = engine
                .compute_sma(&request.pair, request.limit, request.period, request.from, request.to)
                .await
                .change_context(AppError::Indicator)?;
            print_json(&values)
        }
        Command::Ema(args) => {
            let request = IndicatorRequest::resolve(args, &config.indicator, Utc::now());
            let engine = build_engine(exmo, &config);
            let values = engine
                .compute_ema(&request.pair, request.limit, request.period, request.from, request.to)
                .await
                .change_context(AppError::Indicator)?;
            print_json(&values)
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// Engine over `source` that stops fetching on ctrl+c.
fn build_engine(source: Arc<dyn QuoteSource>, config: &AppConfig) -> IndicatorEngine {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl+c received, cancelling");
            on_signal.cancel();
        }
    });

    IndicatorEngine::new(source)
        .with_fetch_concurrency(config.indicator.fetch_concurrency)
        .with_cancellation(cancel)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Report<AppError>> {
    let json = serde_json::to_string_pretty(value).change_context(AppError::Output)?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1701300270, 0).unwrap()
    }

    #[test]
    fn cli_parses_indicator_overrides() {
        let cli = Cli::try_parse_from([
            "exmo-indicators",
            "sma",
            "ADA_BTC",
            "--limit",
            "60",
            "--period",
            "3",
            "--hours",
            "3",
        ])
        .unwrap();
        let Command::Sma(args) = cli.command else {
            panic!("expected sma command");
        };

        let request = IndicatorRequest::resolve(args, &IndicatorConfig::default(), now());
        assert_eq!(request.pair, "ADA_BTC");
        assert_eq!(request.limit, 60);
        assert_eq!(request.period, 3);
        assert_eq!(request.from.timestamp(), 1701289470);
        assert_eq!(request.to, now());
    }

    #[test]
    fn indicator_request_falls_back_to_config() {
        let cli = Cli::try_parse_from(["exmo-indicators", "ema"]).unwrap();
        let Command::Ema(args) = cli.command else {
            panic!("expected ema command");
        };

        let request = IndicatorRequest::resolve(args, &IndicatorConfig::default(), now());
        assert_eq!(request.pair, "BTC_USD");
        assert_eq!(request.limit, 30);
        assert_eq!(request.period, 5);
        assert_eq!(request.to - request.from, TimeDelta::hours(48));
    }

    #[test]
    fn trades_requires_a_pair() {
        assert!(Cli::try_parse_from(["exmo-indicators", "trades"]).is_err());
    }

    #[test]
    fn order_book_defaults_limit() {
        let cli = Cli::try_parse_from(["exmo-indicators", "order-book", "BTC_USD", "ETH_USD"])
            .unwrap();
        let Command::OrderBook { limit, pairs } = cli.command else {
            panic!("expected order-book command");
        };
        assert_eq!(limit, 100);
        assert_eq!(pairs, vec!["BTC_USD", "ETH_USD"]);
    }
}
