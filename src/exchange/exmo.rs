use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt, bail};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ExmoConfig;
use crate::error::ExchangeError;
use crate::exchange::Exchange;
use crate::indicator::QuoteSource;
use crate::model::{
    Candle, Currencies, OrderBook, OrderBookLevel, OrderBookPair, Ticker, TickerValue, Trade,
    TradeSide, Trades,
};

pub const EXMO_BASE_URL: &str = "https://api.exmo.com/v1.1";

const TICKER: &str = "ticker";
const TRADES: &str = "trades";
const ORDER_BOOK: &str = "order_book";
const CURRENCY: &str = "currency";
const CANDLES_HISTORY: &str = "candles_history";

pub struct ExmoExchange {
    client: reqwest::Client,
    base_url: String,
}

impl ExmoExchange {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new(), EXMO_BASE_URL)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn from_config(config: &ExmoConfig) -> Result<Self, Report<ExchangeError>> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().change_context(ExchangeError::Request {
            endpoint: config.base_url.clone(),
        })?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    /// POST a form-encoded body and return the raw response body.
    async fn post(
        &self,
        endpoint: &'static str,
        form: &[(&str, &str)],
    ) -> Result<Vec<u8>, Report<ExchangeError>> {
        debug!(endpoint, ?form, "exmo POST");

        let mut request = self.client.post(self.url(endpoint));
        if !form.is_empty() {
            request = request.form(form);
        }
        let response = request
            .send()
            .await
            .change_context(ExchangeError::Request {
                endpoint: endpoint.into(),
            })?;

        read_body(endpoint, response).await
    }

    async fn get(
        &self,
        endpoint: &'static str,
        query: &[(&str, String)],
    ) -> Result<Vec<u8>, Report<ExchangeError>> {
        debug!(endpoint, ?query, "exmo GET");

        let response = self
            .client
            .get(self.url(endpoint))
            .query(query)
            .send()
            .await
            .change_context(ExchangeError::Request {
                endpoint: endpoint.into(),
            })?;

        read_body(endpoint, response).await
    }
}

impl Default for ExmoExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl Exchange for ExmoExchange {
    fn ticker(&self) -> BoxFuture<'_, Result<Ticker, Report<ExchangeError>>> {
        Box::pin(async move {
            let body = self.post(TICKER, &[]).await?;
            decode_ticker(&body)
        })
    }

    fn trades(&self, pairs: &[String]) -> BoxFuture<'_, Result<Trades, Report<ExchangeError>>> {
        let pairs = pairs.to_vec();
        Box::pin(async move {
            let mut trades = Trades::new();
            for pair in &pairs {
                let body = self.post(TRADES, &[("pair", pair.as_str())]).await?;
                trades.extend(decode_trades(&body)?);
            }
            Ok(trades)
        })
    }

    fn order_book(
        &self,
        limit: usize,
        pairs: &[String],
    ) -> BoxFuture<'_, Result<OrderBook, Report<ExchangeError>>> {
        let pairs = pairs.to_vec();
        Box::pin(async move {
            let limit = limit.to_string();
            let mut book = OrderBook::new();
            for pair in &pairs {
                let body = self
                    .post(ORDER_BOOK, &[("pair", pair.as_str()), ("limit", limit.as_str())])
                    .await?;
                book.extend(decode_order_book(&body)?);
            }
            Ok(book)
        })
    }

    fn currencies(&self) -> BoxFuture<'_, Result<Currencies, Report<ExchangeError>>> {
        Box::pin(async move {
            let body = self.post(CURRENCY, &[]).await?;
            parse_body(CURRENCY, &body)
        })
    }

    fn candles_history(
        &self,
        pair: &str,
        resolution: u32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<Candle>, Report<ExchangeError>>> {
        let query = candles_query(pair, resolution, from, to);
        let pair = pair.to_owned();
        Box::pin(async move {
            let body = self.get(CANDLES_HISTORY, &query).await?;
            let candles = decode_candles(&body)?;
            info!(
                pair = %pair,
                resolution,
                fetched = candles.len(),
                "exmo candle fetch complete"
            );
            Ok(candles)
        })
    }
}

impl QuoteSource for ExmoExchange {
    fn close_prices(
        &self,
        pair: &str,
        limit: u32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Vec<f64>, Report<ExchangeError>>> {
        let candles = self.candles_history(pair, limit, from, to);
        Box::pin(async move {
            let candles = candles.await?;
            Ok(candles.into_iter().map(|c| c.close).collect())
        })
    }
}

fn candles_query(
    pair: &str,
    resolution: u32,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<(&'static str, String)> {
    vec![
        ("symbol", pair.to_owned()),
        ("resolution", resolution.to_string()),
        ("from", from.timestamp().to_string()),
        ("to", to.timestamp().to_string()),
    ]
}

async fn read_body(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<Vec<u8>, Report<ExchangeError>> {
    let status = response.status();
    if !status.is_success() {
        return Err(Report::new(ExchangeError::Request {
            endpoint: endpoint.into(),
        })
        .attach(format!("HTTP status: {status}")));
    }

    let body = response
        .bytes()
        .await
        .change_context(ExchangeError::Request {
            endpoint: endpoint.into(),
        })?;
    Ok(body.to_vec())
}

/// Decode a JSON body, surfacing EXMO's in-band error payloads first.
fn parse_body<T: DeserializeOwned>(endpoint: &str, body: &[u8]) -> Result<T, Report<ExchangeError>> {
    let value: Value = serde_json::from_slice(body)
        .change_context(ExchangeError::ResponseParse {
            endpoint: endpoint.into(),
        })
        .attach_with(|| format!("body: {}", String::from_utf8_lossy(body)))?;

    if let Some(message) = upstream_error(&value) {
        bail!(ExchangeError::Upstream {
            endpoint: endpoint.into(),
            message,
        });
    }

    serde_json::from_value(value).change_context(ExchangeError::ResponseParse {
        endpoint: endpoint.into(),
    })
}

/// EXMO answers failures with HTTP 200 and either `{"result": false, "error": ..}`
/// or, on the candle endpoint, `{"s": "error", "errmsg": ..}`.
fn upstream_error(value: &Value) -> Option<String> {
    let object = value.as_object()?;

    if let Some(message) = object
        .get("error")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
    {
        return Some(message.to_owned());
    }
    if object.get("result").and_then(Value::as_bool) == Some(false) {
        return Some("request rejected".into());
    }
    if object.get("s").and_then(Value::as_str) == Some("error") {
        let message = object
            .get("errmsg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Some(message.to_owned());
    }
    None
}

fn parse_f64(endpoint: &str, field: &str, raw: &str) -> Result<f64, Report<ExchangeError>> {
    raw.parse::<f64>()
        .change_context(ExchangeError::ResponseParse {
            endpoint: endpoint.into(),
        })
        .attach_with(|| format!("field {field}: {raw:?}"))
}

fn parse_timestamp(endpoint: &str, secs: i64) -> Result<DateTime<Utc>, Report<ExchangeError>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        Report::new(ExchangeError::ResponseParse {
            endpoint: endpoint.into(),
        })
        .attach(format!("timestamp out of range: {secs}"))
    })
}

fn decode_ticker(body: &[u8]) -> Result<Ticker, Report<ExchangeError>> {
    let raw: BTreeMap<String, ExmoTickerValue> = parse_body(TICKER, body)?;
    raw.into_iter()
        .map(|(pair, value)| value.into_ticker_value().map(|value| (pair, value)))
        .collect()
}

fn decode_trades(body: &[u8]) -> Result<Trades, Report<ExchangeError>> {
    let raw: BTreeMap<String, Vec<ExmoTrade>> = parse_body(TRADES, body)?;
    raw.into_iter()
        .map(|(pair, deals)| {
            deals
                .into_iter()
                .map(ExmoTrade::into_trade)
                .collect::<Result<Vec<_>, _>>()
                .map(|deals| (pair, deals))
        })
        .collect()
}

fn decode_order_book(body: &[u8]) -> Result<OrderBook, Report<ExchangeError>> {
    let raw: BTreeMap<String, ExmoOrderBookPair> = parse_body(ORDER_BOOK, body)?;
    raw.into_iter()
        .map(|(pair, book)| book.into_order_book_pair().map(|book| (pair, book)))
        .collect()
}

fn decode_candles(body: &[u8]) -> Result<Vec<Candle>, Report<ExchangeError>> {
    let raw: ExmoCandlesHistory = parse_body(CANDLES_HISTORY, body)?;
    raw.candles
        .into_iter()
        .map(ExmoCandle::into_candle)
        .collect()
}

// ── REST response types ───────────────────────────────────────────────────────

/// Prices and volumes arrive as decimal strings.
#[derive(Debug, Deserialize)]
struct ExmoTickerValue {
    buy_price: String,
    sell_price: String,
    last_trade: String,
    high: String,
    low: String,
    avg: String,
    vol: String,
    vol_curr: String,
    updated: i64,
}

impl ExmoTickerValue {
    fn into_ticker_value(self) -> Result<TickerValue, Report<ExchangeError>> {
        let f = |field: &str, raw: &str| parse_f64(TICKER, field, raw);
        Ok(TickerValue {
            buy_price: f("buy_price", &self.buy_price)?,
            sell_price: f("sell_price", &self.sell_price)?,
            last_trade: f("last_trade", &self.last_trade)?,
            high: f("high", &self.high)?,
            low: f("low", &self.low)?,
            avg: f("avg", &self.avg)?,
            vol: f("vol", &self.vol)?,
            vol_curr: f("vol_curr", &self.vol_curr)?,
            updated: parse_timestamp(TICKER, self.updated)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExmoTrade {
    trade_id: i64,
    date: i64,
    #[serde(rename = "type")]
    side: TradeSide,
    quantity: String,
    price: String,
    amount: String,
}

impl ExmoTrade {
    fn into_trade(self) -> Result<Trade, Report<ExchangeError>> {
        Ok(Trade {
            trade_id: self.trade_id,
            date: parse_timestamp(TRADES, self.date)?,
            side: self.side,
            quantity: parse_f64(TRADES, "quantity", &self.quantity)?,
            price: parse_f64(TRADES, "price", &self.price)?,
            amount: parse_f64(TRADES, "amount", &self.amount)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExmoOrderBookPair {
    ask_quantity: String,
    ask_amount: String,
    ask_top: String,
    bid_quantity: String,
    bid_amount: String,
    bid_top: String,
    /// `[price, quantity, amount]` rows
    ask: Vec<(String, String, String)>,
    bid: Vec<(String, String, String)>,
}

impl ExmoOrderBookPair {
    fn into_order_book_pair(self) -> Result<OrderBookPair, Report<ExchangeError>> {
        let f = |field: &str, raw: &str| parse_f64(ORDER_BOOK, field, raw);
        Ok(OrderBookPair {
            ask_quantity: f("ask_quantity", &self.ask_quantity)?,
            ask_amount: f("ask_amount", &self.ask_amount)?,
            ask_top: f("ask_top", &self.ask_top)?,
            bid_quantity: f("bid_quantity", &self.bid_quantity)?,
            bid_amount: f("bid_amount", &self.bid_amount)?,
            bid_top: f("bid_top", &self.bid_top)?,
            ask: into_levels(self.ask)?,
            bid: into_levels(self.bid)?,
        })
    }
}

fn into_levels(
    rows: Vec<(String, String, String)>,
) -> Result<Vec<OrderBookLevel>, Report<ExchangeError>> {
    rows.into_iter()
        .map(|(price, quantity, amount)| {
            Ok(OrderBookLevel {
                price: parse_f64(ORDER_BOOK, "price", &price)?,
                quantity: parse_f64(ORDER_BOOK, "quantity", &quantity)?,
                amount: parse_f64(ORDER_BOOK, "amount", &amount)?,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ExmoCandlesHistory {
    #[serde(default)]
    candles: Vec<ExmoCandle>,
}

#[derive(Debug, Deserialize)]
struct ExmoCandle {
    /// open time, ms epoch
    t: i64,
    o: f64,
    c: f64,
    h: f64,
    l: f64,
    v: f64,
}

impl ExmoCandle {
    fn into_candle(self) -> Result<Candle, Report<ExchangeError>> {
        let open_time = DateTime::from_timestamp_millis(self.t).ok_or_else(|| {
            Report::new(ExchangeError::ResponseParse {
                endpoint: CANDLES_HISTORY.into(),
            })
            .attach(format!("timestamp out of range: {}", self.t))
        })?;

        Ok(Candle {
            open_time,
            open: self.o,
            high: self.h,
            low: self.l,
            close: self.c,
            volume: self.v,
        })
    }
}
