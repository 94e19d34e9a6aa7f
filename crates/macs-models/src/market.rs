use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange statistics for one ticker, supplied by the market-data collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketStats {
    pub symbol: String,
    /// Quote-currency volume over the last 24 hours.
    pub volume_24h: Decimal,
    /// Bid/ask spread as reported by the exchange.
    pub spread: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// Market stats keyed by symbol.
pub type MarketStatsMap = BTreeMap<String, MarketStats>;

pub fn stats_by_symbol<I>(stats: I) -> MarketStatsMap
where
    I: IntoIterator<Item = MarketStats>,
{
    stats.into_iter().map(|s| (s.symbol.clone(), s)).collect()
}
