use serde::{Deserialize, Serialize};

/// Categories of rows MACS reads from the shared cache.
/// External data collectors use these when writing to the shared SQLite cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    /// `value_json` is one tagged `Evidence` record.
    Evidence,
    /// `value_json` is one `MarketStats` record.
    MarketStats,
}

impl CacheCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Evidence => "evidence",
            CacheCategory::MarketStats => "market_stats",
        }
    }
}

/// The expected SQLite table schema that data collectors write to
/// and MACS reads from.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS cache_entries (
///     key         TEXT PRIMARY KEY,
///     category    TEXT NOT NULL,
///     value_json  TEXT NOT NULL,
///     source      TEXT NOT NULL,
///     symbol      TEXT,
///     created_at  TEXT NOT NULL,
///     expires_at  TEXT NOT NULL,
///     updated_at  TEXT NOT NULL
/// );
/// ```
pub const CACHE_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS cache_entries (
    key         TEXT PRIMARY KEY,
    category    TEXT NOT NULL,
    value_json  TEXT NOT NULL,
    source      TEXT NOT NULL,
    symbol      TEXT,
    created_at  TEXT NOT NULL,
    expires_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cache_category ON cache_entries(category);
CREATE INDEX IF NOT EXISTS idx_cache_symbol ON cache_entries(symbol);
CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache_entries(expires_at);
";

/// Key pattern conventions for the cache.
///
/// - Evidence: `evidence:{ticker}:{id}` (e.g., `evidence:BTC:news-17`, `evidence:GLOBAL:fg-3`)
/// - Market stats: `stats:{symbol}` (e.g., `stats:ETH`)
pub mod key_patterns {
    pub fn evidence(ticker: &str, id: &str) -> String {
        format!("evidence:{ticker}:{id}")
    }

    pub fn market_stats(symbol: &str) -> String {
        format!("stats:{symbol}")
    }
}

/// A raw cache row as read from SQLite.
#[derive(Debug, Clone)]
pub struct CacheRow {
    pub key: String,
    pub category: String,
    pub value_json: String,
    pub source: String,
    pub symbol: Option<String>,
    pub created_at: String,
    pub expires_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_pattern_evidence() {
        assert_eq!(key_patterns::evidence("BTC", "news-17"), "evidence:BTC:news-17");
    }

    #[test]
    fn key_pattern_market_stats() {
        assert_eq!(key_patterns::market_stats("ETH"), "stats:ETH");
    }

    #[test]
    fn category_names_match_serde() {
        for cat in [CacheCategory::Evidence, CacheCategory::MarketStats] {
            let json = serde_json::to_string(&cat).unwrap();
            assert_eq!(json.trim_matches('"'), cat.as_str());
        }
    }
}
