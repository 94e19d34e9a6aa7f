//! Best-effort recovery of the structured claims block embedded in role output.
//!
//! Handles the formats models actually produce:
//! - Clean JSON: `{"claims": [...]}`
//! - Markdown-wrapped: ```` ```json\n{...}\n``` ````
//! - Prose before the block, `//` and `/* */` comments inside it
//! - Truncated or sloppy JSON (see [`crate::repair`])
//!
//! Recovery never fails. The worst case is an invalid block and the whole
//! cleaned text as narrative, which the text fallback can still mine.

use serde_json::Value;
use tracing::debug;

use crate::repair::repair;

/// What could be salvaged from one role's raw output.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredOutput {
    /// Prose preceding the block, or the whole cleaned text when no block decoded.
    pub narrative: String,
    pub block: Option<Value>,
    pub is_structured_valid: bool,
    /// The block decoded only after repairs.
    pub repaired: bool,
    pub errors: Vec<String>,
}

impl RecoveredOutput {
    fn invalid(cleaned: &str, errors: Vec<String>) -> Self {
        Self {
            narrative: cleaned.trim().to_string(),
            block: None,
            is_structured_valid: false,
            repaired: false,
            errors,
        }
    }

    fn valid(narrative: &str, block: Value, repaired: bool, errors: Vec<String>) -> Self {
        Self {
            narrative: narrative.trim().to_string(),
            block: Some(block),
            is_structured_valid: true,
            repaired,
            errors,
        }
    }
}

pub fn recover(raw: &str) -> RecoveredOutput {
    let cleaned = strip_noise(raw);

    let Some(start) = locate_block(&cleaned) else {
        return RecoveredOutput::invalid(&cleaned, vec!["no structured block found".to_string()]);
    };

    let (end, complete) = scan_block(&cleaned, start);
    let candidate = &cleaned[start..end];
    let mut errors = Vec::new();
    if !complete {
        errors.push(format!("block starting at byte {start} is truncated"));
    }

    match serde_json::from_str::<Value>(candidate) {
        Ok(block) => return RecoveredOutput::valid(&cleaned[..start], block, false, errors),
        Err(e) => errors.push(format!("decode failed: {e}")),
    }

    let repaired = repair(candidate);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(block) => {
            debug!(start, len = candidate.len(), "Claims block decoded after repair");
            RecoveredOutput::valid(&cleaned[..start], block, true, errors)
        }
        Err(e) => {
            errors.push(format!("decode after repair failed: {e}"));
            RecoveredOutput::invalid(&cleaned, errors)
        }
    }
}

/// Remove code-fence markers and comments that sit outside string literals.
pub fn strip_noise(raw: &str) -> String {
    let unfenced = raw
        .replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "");
    strip_comments(&unfenced)
}

fn strip_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copy_from = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = string_end(bytes, i).map_or(bytes.len(), |end| end + 1);
            }
            // `://` is a URL in prose, not a comment
            b'/' if bytes.get(i + 1) == Some(&b'/') && (i == 0 || bytes[i - 1] != b':') => {
                out.push_str(&text[copy_from..i]);
                i = text[i..].find('\n').map_or(bytes.len(), |p| i + p);
                copy_from = i;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                out.push_str(&text[copy_from..i]);
                i = text[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2);
                copy_from = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&text[copy_from..]);
    out
}

/// Start of the claims block: `{` followed by a `"claims"` key, else the first `{` or `[`.
pub fn locate_block(text: &str) -> Option<usize> {
    text.match_indices('{')
        .map(|(i, _)| i)
        .find(|&i| text[i + 1..].trim_start().starts_with("\"claims\""))
        .or_else(|| text.find(|c| c == '{' || c == '['))
}

/// End (exclusive) of the block starting at `start`, and whether its closer was found.
///
/// String literals are skipped so delimiters inside them do not count. A
/// block the text never closes runs to the end of the text.
pub fn scan_block(text: &str, start: usize) -> (usize, bool) {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => match string_end(bytes, i) {
                Some(end) => i = end,
                None => return (bytes.len(), false),
            },
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return (i + 1, true);
                }
            }
            _ => {}
        }
        i += 1;
    }
    (bytes.len(), false)
}

/// Index of the quote closing the string literal opened at `open`.
pub(crate) fn string_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = r#"{"claims": [{"ticker": "BTC", "action": "BUY", "confidence": 0.72, "evidence": ["rsi-btc"]}]}"#;

    fn claims(output: &RecoveredOutput) -> &Vec<Value> {
        output.block.as_ref().unwrap()["claims"].as_array().unwrap()
    }

    #[test]
    fn clean_block() {
        let out = recover(CLEAN);
        assert!(out.is_structured_valid);
        assert!(!out.repaired);
        assert!(out.narrative.is_empty());
        assert_eq!(claims(&out)[0]["ticker"], "BTC");
    }

    #[test]
    fn fenced_block_with_prose() {
        let raw = format!("Momentum is building on majors.\n```json\n{CLEAN}\n```\nThat's all.");
        let out = recover(&raw);
        assert!(out.is_structured_valid);
        assert_eq!(out.narrative, "Momentum is building on majors.");
        assert_eq!(claims(&out).len(), 1);
    }

    #[test]
    fn marker_preferred_over_earlier_braces() {
        let raw = format!("Context {{not json}} first.\n{CLEAN}");
        let out = recover(&raw);
        assert!(out.is_structured_valid);
        assert!(out.narrative.starts_with("Context"));
        assert_eq!(claims(&out)[0]["action"], "BUY");
    }

    #[test]
    fn comments_are_removed_outside_strings() {
        let raw = r#"{
            "claims": [
                // strongest conviction first
                {"ticker": "ETH", "action": "SELL", /* weak */ "confidence": 0.6,
                 "source": "https://example.com/a//b"}
            ]
        }"#;
        let out = recover(raw);
        assert!(out.is_structured_valid);
        assert!(!out.repaired);
        assert_eq!(claims(&out)[0]["source"], "https://example.com/a//b");
    }

    #[test]
    fn missing_closer_recovers_same_claims() {
        let truncated = &CLEAN[..CLEAN.len() - 1];
        let out = recover(truncated);
        assert!(out.is_structured_valid);
        assert!(out.repaired);
        assert_eq!(out.block, recover(CLEAN).block);
    }

    #[test]
    fn trailing_comma_and_bare_keys() {
        let raw = r#"{claims: [{ticker: "SOL", action: "HOLD", confidence: 0.5,},]}"#;
        let out = recover(raw);
        assert!(out.is_structured_valid);
        assert!(out.repaired);
        assert_eq!(claims(&out)[0]["ticker"], "SOL");
    }

    #[test]
    fn truncated_url_becomes_placeholder() {
        let raw = r#"Analysis below.
{"claims": [{"ticker": "BTC", "action": "BUY", "confidence": 0.7, "source": "https://news.example.com/2024/05/etf-inf"#;
        let out = recover(raw);
        assert!(out.is_structured_valid);
        assert_eq!(claims(&out)[0]["source"], "[truncated-url]");
        assert_eq!(out.narrative, "Analysis below.");
    }

    #[test]
    fn braces_inside_strings_do_not_end_block() {
        let raw = r#"{"claims": [{"ticker": "BTC", "action": "BUY", "confidence": 0.6, "rationale": "range {60k} to ]70k["}]} trailing"#;
        let out = recover(raw);
        assert!(out.is_structured_valid);
        assert!(!out.repaired);
        assert_eq!(claims(&out)[0]["rationale"], "range {60k} to ]70k[");
    }

    #[test]
    fn bare_array_block() {
        let out = recover(r#"[{"ticker": "ETH", "action": "BUY", "confidence": 0.8}]"#);
        assert!(out.is_structured_valid);
        assert!(out.block.unwrap().is_array());
    }

    #[test]
    fn plain_text_has_no_block() {
        let out = recover("BTC looks strong: BUY. ETH: HOLD for now.");
        assert!(!out.is_structured_valid);
        assert!(out.block.is_none());
        assert_eq!(out.narrative, "BTC looks strong: BUY. ETH: HOLD for now.");
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn unrepairable_block_keeps_whole_text_as_narrative() {
        let raw = "Summary: BTC BUY\n{\"claims\": [{\"ticker\": BTC BUY ???}]}";
        let out = recover(raw);
        assert!(!out.is_structured_valid);
        assert_eq!(out.narrative, raw);
        assert!(out.errors.iter().any(|e| e.contains("after repair")));
    }

    #[test]
    fn empty_input() {
        let out = recover("");
        assert!(!out.is_structured_valid);
        assert!(out.narrative.is_empty());
    }

    #[test]
    fn scan_reports_truncation() {
        assert_eq!(scan_block("{\"a\": [1, 2]}", 0), (13, true));
        assert_eq!(scan_block("{\"a\": [1, 2", 0), (11, false));
        assert_eq!(scan_block("{\"a\": \"unterminated", 0), (19, false));
    }
}
