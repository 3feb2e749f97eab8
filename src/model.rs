use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest market statistics, keyed by pair (e.g. `"BTC_USD"`).
pub type Ticker = BTreeMap<String, TickerValue>;

/// Recent deals, keyed by pair.
pub type Trades = BTreeMap<String, Vec<Trade>>;

/// Order book snapshots, keyed by pair.
pub type OrderBook = BTreeMap<String, OrderBookPair>;

/// Currency codes listed on the exchange.
pub type Currencies = Vec<String>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerValue {
    pub buy_price: f64,
    pub sell_price: f64,
    pub last_trade: f64,
    pub high: f64,
    pub low: f64,
    pub avg: f64,
    pub vol: f64,
    pub vol_curr: f64,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub trade_id: i64,
    pub date: DateTime<Utc>,
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBookLevel {
    pub price: f64,
    pub quantity: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBookPair {
    pub ask_quantity: f64,
    pub ask_amount: f64,
    pub ask_top: f64,
    pub bid_quantity: f64,
    pub bid_amount: f64,
    pub bid_top: f64,
    pub ask: Vec<OrderBookLevel>,
    pub bid: Vec<OrderBookLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_side_display() {
        assert_eq!(TradeSide::Buy.to_string(), "buy");
        assert_eq!(TradeSide::Sell.to_string(), "sell");
    }

    #[test]
    fn trade_side_deserializes_lowercase() {
        let side: TradeSide = serde_json::from_str("\"sell\"").unwrap();
        assert_eq!(side, TradeSide::Sell);
        assert!(serde_json::from_str::<TradeSide>("\"SELL\"").is_err());
    }
}
