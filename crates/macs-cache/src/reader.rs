use std::sync::Mutex;
use std::time::Duration;

use macs_models::cache_schema::{key_patterns, CacheCategory};
use macs_models::config::CacheConfig;
use macs_models::evidence::{Evidence, EvidenceIndex, GLOBAL_TICKER};
use macs_models::market::{MarketStats, MarketStatsMap};
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::memory::MemoryCache;
use crate::sqlite::SqliteReader;

/// Everything a round reads from the shared cache.
#[derive(Debug, Clone, Default)]
pub struct RoundSnapshot {
    pub evidence: EvidenceIndex,
    pub market_stats: MarketStatsMap,
    /// Rows that could not be decoded or failed validation.
    pub skipped: usize,
}

/// Read-through cache: moka (hot, decoded market stats) → SQLite (shared) → None.
///
/// Evidence is always read fresh from SQLite; market stats are promoted to moka
/// on a SQLite hit. SQLite access is synchronized via `Mutex` since
/// `rusqlite::Connection` is not `Sync`.
pub struct CacheReader {
    memory: MemoryCache<MarketStats>,
    sqlite: Mutex<SqliteReader>,
}

impl CacheReader {
    pub fn new(sqlite: SqliteReader, max_capacity: u64, memory_ttl: Duration) -> Self {
        Self {
            memory: MemoryCache::new(max_capacity, memory_ttl),
            sqlite: Mutex::new(sqlite),
        }
    }

    /// Open the shared cache read-only as configured.
    pub fn open(config: &CacheConfig) -> Result<Self, CacheError> {
        let sqlite = SqliteReader::open(&config.sqlite_path)?;
        Ok(Self::new(
            sqlite,
            config.memory_max_capacity,
            Duration::from_secs(config.memory_ttl_seconds),
        ))
    }

    fn sqlite(&self) -> Result<std::sync::MutexGuard<'_, SqliteReader>, CacheError> {
        self.sqlite
            .lock()
            .map_err(|e| CacheError::Unavailable(format!("SQLite mutex poisoned: {e}")))
    }

    /// Market stats for one symbol. Checks moka first, then SQLite.
    pub async fn market_stats(&self, symbol: &str) -> Result<Option<MarketStats>, CacheError> {
        let key = key_patterns::market_stats(symbol);
        if let Some(stats) = self.memory.get(&key).await {
            return Ok(Some(stats));
        }

        // TTL filtering happens in the query
        let row = self.sqlite()?.get(&key)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let stats: MarketStats = serde_json::from_str(&row.value_json).map_err(|source| {
            CacheError::Decode {
                key: key.clone(),
                source,
            }
        })?;
        self.memory.insert(key, stats.clone()).await;
        Ok(Some(stats))
    }

    /// Decoded evidence rows stored under `evidence:{ticker}:`. Bad rows are
    /// returned as errors alongside the good ones.
    pub fn evidence_for(&self, ticker: &str) -> Result<(Vec<Evidence>, Vec<CacheError>), CacheError> {
        let rows = self
            .sqlite()?
            .get_by_prefix(CacheCategory::Evidence.as_str(), &key_patterns::evidence(ticker, ""))?;

        let mut evidence = Vec::with_capacity(rows.len());
        let mut errors = Vec::new();
        for row in rows {
            match serde_json::from_str::<Evidence>(&row.value_json) {
                Ok(e) => evidence.push(e),
                Err(source) => errors.push(CacheError::Decode { key: row.key, source }),
            }
        }
        Ok((evidence, errors))
    }

    /// Build the per-round snapshot for a universe (plus `GLOBAL` evidence).
    ///
    /// Undecodable or invalid rows are skipped and counted; only SQLite
    /// failures abort the load.
    pub async fn load_snapshot(&self, universe: &[String]) -> Result<RoundSnapshot, CacheError> {
        let mut snapshot = RoundSnapshot::default();

        let tickers = universe
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(GLOBAL_TICKER));
        for ticker in tickers {
            let (evidence, errors) = self.evidence_for(ticker)?;
            for e in errors {
                warn!(ticker, error = %e, "Skipping undecodable evidence row");
                snapshot.skipped += 1;
            }
            for item in evidence {
                if let Err(e) = snapshot.evidence.insert(item) {
                    warn!(ticker, error = %e, "Skipping invalid evidence");
                    snapshot.skipped += 1;
                }
            }
        }

        for symbol in universe {
            match self.market_stats(symbol).await {
                Ok(Some(stats)) => {
                    snapshot.market_stats.insert(symbol.clone(), stats);
                }
                Ok(None) => debug!(symbol = %symbol, "No market stats cached"),
                Err(e @ CacheError::Decode { .. }) => {
                    warn!(symbol = %symbol, error = %e, "Skipping undecodable market stats");
                    snapshot.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            evidence = snapshot.evidence.len(),
            market_stats = snapshot.market_stats.len(),
            skipped = snapshot.skipped,
            hot_entries = self.hot_cache_size(),
            "Cache snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Number of entries in the hot moka cache.
    pub fn hot_cache_size(&self) -> u64 {
        self.memory.entry_count()
    }
}
