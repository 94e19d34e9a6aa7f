//! Candidate claims from recovered role output: lenient block decoding, with a
//! line-oriented text fallback when no block could be decoded.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use macs_models::claim::{Claim, Direction, Role, ACTION_KEYWORDS};
use macs_models::evidence::EvidenceIndex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::recovery::RecoveredOutput;

pub const FALLBACK_CONFIDENCE: f64 = 0.5;
const FALLBACK_EVIDENCE_LIMIT: usize = 3;

/// Round context used to fill in what the role left out.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    pub role: Role,
    pub universe: &'a [String],
    pub index: &'a EvidenceIndex,
    /// Round cutoff. Stamps claims without their own `generated_at` and bounds
    /// the evidence fallback claims may cite.
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub claims: Vec<Claim>,
    pub used_fallback: bool,
    /// Elements or blocks that could not be turned into claims.
    pub errors: Vec<String>,
}

pub fn extract_claims(recovered: &RecoveredOutput, ctx: &ExtractionContext<'_>) -> Extraction {
    let mut out = Extraction::default();

    match (&recovered.block, recovered.is_structured_valid) {
        (Some(block), true) => match claim_elements(block) {
            Some(elements) => {
                for (position, element) in elements.iter().enumerate() {
                    match decode_claim(element, position, ctx) {
                        Ok(claim) => out.claims.push(claim),
                        Err(e) => out.errors.push(e),
                    }
                }
            }
            None => out.errors.push("structured block has no claims array".to_string()),
        },
        _ if !recovered.narrative.trim().is_empty() => {
            out.claims = fallback_claims(&recovered.narrative, ctx);
            out.used_fallback = true;
        }
        _ => {}
    }

    debug!(
        role = %ctx.role,
        claims = out.claims.len(),
        errors = out.errors.len(),
        fallback = out.used_fallback,
        "Claims extracted"
    );
    out
}

fn claim_elements(block: &Value) -> Option<&Vec<Value>> {
    match block {
        Value::Array(elements) => Some(elements),
        Value::Object(map) => map.get("claims").and_then(Value::as_array),
        _ => None,
    }
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
}

fn number_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Decode one element leniently.
///
/// Missing ticker/action become empty strings so the verifier can reject the
/// claim with a schema violation; only non-objects and elements without a
/// usable confidence are skipped here.
fn decode_claim(element: &Value, position: usize, ctx: &ExtractionContext<'_>) -> Result<Claim, String> {
    let obj = element
        .as_object()
        .ok_or_else(|| format!("claim #{position} is not an object"))?;

    let confidence = obj
        .get("confidence")
        .and_then(number_field)
        .ok_or_else(|| format!("claim #{position} has no numeric confidence"))?;

    let ticker = text_field(obj, &["ticker", "symbol"]).unwrap_or_default();
    let action = text_field(obj, &["action", "recommendation"]).unwrap_or_default();
    let role = text_field(obj, &["role"])
        .and_then(|r| Role::parse(&r))
        .unwrap_or(ctx.role);
    let generated_at = text_field(obj, &["generated_at"])
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(ctx.generated_at);
    let id = text_field(obj, &["id"])
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("{role}-{ticker}-{position}-{}", ctx.generated_at.timestamp()));

    let mut evidence = string_list(obj.get("evidence"));
    if evidence.is_empty() {
        evidence = string_list(obj.get("evidence_ids"));
    }

    let signals: BTreeMap<String, f64> = obj
        .get("signals")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| number_field(v).map(|n| (k.clone(), n)))
                .collect()
        })
        .unwrap_or_default();

    let direction = obj
        .get("direction")
        .and_then(|v| serde_json::from_value::<Direction>(v.clone()).ok());

    let mut claim = Claim::new(id, ticker, role, action, confidence, generated_at).with_evidence(evidence);
    claim.risk_flags = string_list(obj.get("risk_flags"));
    claim.signals = signals;
    claim.direction = direction;
    claim.magnitude = obj.get("magnitude").and_then(number_field);
    claim.rationale = text_field(obj, &["rationale", "reasoning"]);
    Ok(claim)
}

/// Mine free text for `TICKER ... ACTION` on a line; the last such line per ticker wins.
pub fn fallback_claims(narrative: &str, ctx: &ExtractionContext<'_>) -> Vec<Claim> {
    let mut claims = Vec::new();

    for ticker in ctx.universe {
        let found = narrative
            .lines()
            .filter_map(|line| action_after_ticker(line, ticker).map(|action| (action, line.trim())))
            .last();
        let Some((action, line)) = found else {
            continue;
        };

        let mut evidence: Vec<String> = ctx
            .index
            .ids_for_ticker(ticker, ctx.generated_at)
            .into_iter()
            .take(FALLBACK_EVIDENCE_LIMIT)
            .map(str::to_string)
            .collect();
        if evidence.is_empty() {
            evidence.push(format!("synthetic:{ticker}"));
        }

        let id = format!("{}-{ticker}-fallback-{}", ctx.role, ctx.generated_at.timestamp());
        let mut claim = Claim::new(id, ticker.clone(), ctx.role, action, FALLBACK_CONFIDENCE, ctx.generated_at)
            .with_evidence(evidence);
        claim.rationale = Some(line.to_string());
        claims.push(claim);
    }
    claims
}

/// First action keyword after a whole-word mention of `ticker` on this line.
fn action_after_ticker(line: &str, ticker: &str) -> Option<&'static str> {
    let mut words = line
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()));

    words.position(|w| w.eq_ignore_ascii_case(ticker))?;
    words.find_map(|w| ACTION_KEYWORDS.iter().copied().find(|k| *k == w))
}
