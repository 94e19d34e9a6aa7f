use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Ticker used by evidence that is not tied to a single asset (market-wide indices).
pub const GLOBAL_TICKER: &str = "GLOBAL";

/// Fields shared by every evidence variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceMeta {
    pub id: String,
    /// Asset ticker, or `GLOBAL` for market-wide observations.
    pub ticker: String,
    pub observed_at: DateTime<Utc>,
    /// 0.0 to 1.0 relevance to the ticker.
    pub relevance: f64,
    /// -1.0 (bearish) to 1.0 (bullish) expected impact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsEvidence {
    #[serde(flatten)]
    pub meta: EvidenceMeta,
    pub source: String,
    pub url: String,
    pub snippet: String,
}

/// Closed set of exchange metrics a `market` evidence may carry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MarketMetric {
    #[serde(rename = "volume_24h")]
    Volume24h,
    SpreadBps,
    Close,
    Vwap,
    LiquidityScore,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketEvidence {
    #[serde(flatten)]
    pub meta: EvidenceMeta,
    /// Exchange the metric was observed on.
    pub source: String,
    pub metric: MarketMetric,
    pub value: f64,
}

/// Shape shared by `tech`, `onchain` and `social` evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricEvidence {
    #[serde(flatten)]
    pub meta: EvidenceMeta,
    pub source: String,
    /// Free-form but non-empty, e.g. `RSI(14,1h)`.
    pub metric: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEvidence {
    #[serde(flatten)]
    pub meta: EvidenceMeta,
    /// Index name, e.g. `fear_greed`.
    pub name: String,
    pub value: f64,
}

/// A timestamped, sourced observation that may back a claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Evidence {
    News(NewsEvidence),
    Market(MarketEvidence),
    Tech(MetricEvidence),
    Onchain(MetricEvidence),
    Social(MetricEvidence),
    Index(IndexEvidence),
}

impl Evidence {
    pub fn meta(&self) -> &EvidenceMeta {
        match self {
            Evidence::News(e) => &e.meta,
            Evidence::Market(e) => &e.meta,
            Evidence::Tech(e) | Evidence::Onchain(e) | Evidence::Social(e) => &e.meta,
            Evidence::Index(e) => &e.meta,
        }
    }

    pub fn id(&self) -> &str {
        &self.meta().id
    }

    pub fn ticker(&self) -> &str {
        &self.meta().ticker
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.meta().observed_at
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Evidence::News(_) => "news",
            Evidence::Market(_) => "market",
            Evidence::Tech(_) => "tech",
            Evidence::Onchain(_) => "onchain",
            Evidence::Social(_) => "social",
            Evidence::Index(_) => "index",
        }
    }

    /// Numeric reading carried by the evidence. News carries none.
    pub fn value(&self) -> Option<f64> {
        match self {
            Evidence::News(_) => None,
            Evidence::Market(e) => Some(e.value),
            Evidence::Tech(e) | Evidence::Onchain(e) | Evidence::Social(e) => Some(e.value),
            Evidence::Index(e) => Some(e.value),
        }
    }

    pub fn is_global(&self) -> bool {
        self.ticker() == GLOBAL_TICKER
    }

    /// Check the numeric and shape invariants every evidence record must hold.
    pub fn validate(&self) -> Result<(), ModelError> {
        let meta = self.meta();
        let id = || meta.id.clone();

        if meta.id.trim().is_empty() {
            return Err(ModelError::EmptyField { id: id(), field: "id" });
        }
        if meta.ticker.trim().is_empty() {
            return Err(ModelError::EmptyField {
                id: id(),
                field: "ticker",
            });
        }
        check_range(&meta.id, "relevance", meta.relevance, 0.0, 1.0)?;
        if let Some(confidence) = meta.confidence {
            check_range(&meta.id, "confidence", confidence, 0.0, 1.0)?;
        }
        if let Some(impact) = meta.impact {
            check_range(&meta.id, "impact", impact, -1.0, 1.0)?;
        }
        if let Some(value) = self.value() {
            if !value.is_finite() {
                return Err(ModelError::NonFiniteValue { id: id() });
            }
        }

        match self {
            Evidence::News(e) => {
                if e.source.trim().is_empty() {
                    return Err(ModelError::EmptyField {
                        id: id(),
                        field: "source",
                    });
                }
            }
            Evidence::Market(_) => {}
            Evidence::Tech(e) | Evidence::Onchain(e) | Evidence::Social(e) => {
                if e.metric.trim().is_empty() {
                    return Err(ModelError::EmptyField {
                        id: id(),
                        field: "metric",
                    });
                }
            }
            Evidence::Index(e) => {
                if e.name.trim().is_empty() {
                    return Err(ModelError::EmptyField {
                        id: id(),
                        field: "name",
                    });
                }
                if meta.ticker != GLOBAL_TICKER {
                    return Err(ModelError::IndexTicker {
                        id: id(),
                        ticker: meta.ticker.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

fn check_range(id: &str, field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ModelError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ModelError::OutOfRange {
            id: id.to_string(),
            field,
            value,
            min,
            max,
        })
    }
}

/// How an evidence id resolves against a claim's ticker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    /// Evidence exists for the ticker (or is `GLOBAL`).
    Bound(&'a Evidence),
    /// Evidence exists but belongs to a different asset.
    OtherTicker(&'a Evidence),
    Missing,
}

/// Per-round evidence lookup, keyed by evidence id.
///
/// Built once by the caller for each round and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceIndex {
    entries: BTreeMap<String, Evidence>,
}

impl EvidenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index, collecting (not failing on) invalid or duplicate records.
    pub fn from_evidence<I>(evidence: I) -> (Self, Vec<ModelError>)
    where
        I: IntoIterator<Item = Evidence>,
    {
        let mut index = Self::new();
        let mut errors = Vec::new();
        for item in evidence {
            if let Err(e) = index.insert(item) {
                errors.push(e);
            }
        }
        (index, errors)
    }

    pub fn insert(&mut self, evidence: Evidence) -> Result<(), ModelError> {
        evidence.validate()?;
        if self.entries.contains_key(evidence.id()) {
            return Err(ModelError::DuplicateEvidence(evidence.id().to_string()));
        }
        self.entries.insert(evidence.id().to_string(), evidence);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Evidence> {
        self.entries.get(id)
    }

    pub fn resolve(&self, id: &str, ticker: &str) -> Resolution<'_> {
        match self.entries.get(id) {
            Some(e) if e.ticker() == ticker || e.is_global() => Resolution::Bound(e),
            Some(e) => Resolution::OtherTicker(e),
            None => Resolution::Missing,
        }
    }

    /// Evidence ids for one ticker observed by `as_of`, most relevant first
    /// (ties broken by id).
    pub fn ids_for_ticker(&self, ticker: &str, as_of: DateTime<Utc>) -> Vec<&str> {
        let mut matched: Vec<&Evidence> = self
            .entries
            .values()
            .filter(|e| e.ticker() == ticker && e.observed_at() <= as_of)
            .collect();
        matched.sort_by(|a, b| {
            b.meta()
                .relevance
                .total_cmp(&a.meta().relevance)
                .then_with(|| a.id().cmp(b.id()))
        });
        matched.into_iter().map(|e| e.id()).collect()
    }

    /// Evidence relevant to a set of tickers (including `GLOBAL` entries)
    /// observed by `as_of`.
    pub fn for_universe(&self, universe: &[String], as_of: DateTime<Utc>) -> Vec<&Evidence> {
        self.entries
            .values()
            .filter(|e| e.is_global() || universe.iter().any(|t| t == e.ticker()))
            .filter(|e| e.observed_at() <= as_of)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Evidence> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
