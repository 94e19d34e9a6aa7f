//! Bounded repairs for a claims block that failed to decode.
//!
//! Applied once, in order: truncated URLs, trailing separators, missing
//! closers, unquoted keys. Each pass is string-literal aware.

use crate::recovery::string_end;

pub const TRUNCATED_URL: &str = "[truncated-url]";

pub fn repair(block: &str) -> String {
    let text = replace_truncated_urls(block);
    let text = remove_trailing_separators(&text);
    let text = balance_closers(&text);
    quote_unquoted_keys(&text)
}

/// Replace URL string values that were cut off (unterminated, or ending in an ellipsis).
pub fn replace_truncated_urls(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copy_from = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }
        let end = string_end(bytes, i);
        let content = &text[i + 1..end.unwrap_or(bytes.len())];
        let is_url = content.starts_with("http://") || content.starts_with("https://");
        let cut_off = end.is_none() || content.ends_with("...") || content.ends_with('…');
        if is_url && cut_off {
            out.push_str(&text[copy_from..i]);
            out.push('"');
            out.push_str(TRUNCATED_URL);
            out.push('"');
            copy_from = end.map_or(bytes.len(), |e| e + 1);
        }
        i = end.map_or(bytes.len(), |e| e + 1);
    }
    out.push_str(&text[copy_from..]);
    out
}

/// Drop commas that are followed only by whitespace and a closer, or by nothing.
pub fn remove_trailing_separators(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copy_from = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = string_end(bytes, i).map_or(bytes.len(), |e| e + 1);
                continue;
            }
            b',' => {
                let rest = text[i + 1..].trim_start();
                if rest.is_empty() || rest.starts_with('}') || rest.starts_with(']') {
                    out.push_str(&text[copy_from..i]);
                    copy_from = i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    out.push_str(&text[copy_from..]);
    out
}

/// Close an open string, then append the closers still owed, innermost first.
pub fn balance_closers(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut open: Vec<u8> = Vec::new();
    let mut in_open_string = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => match string_end(bytes, i) {
                Some(end) => i = end,
                None => {
                    in_open_string = true;
                    break;
                }
            },
            b'{' => open.push(b'}'),
            b'[' => open.push(b']'),
            b'}' | b']' => {
                if open.last() == Some(&bytes[i]) {
                    open.pop();
                }
            }
            _ => {}
        }
        i += 1;
    }

    let mut out = text.to_string();
    if in_open_string {
        if out.ends_with('\\') {
            out.pop();
        }
        out.push('"');
    }
    if open.is_empty() {
        return out;
    }
    // a separator left dangling by the cut
    let trimmed_len = out.trim_end().trim_end_matches(',').len();
    out.truncate(trimmed_len);
    out.extend(open.iter().rev().map(|&c| c as char));
    out
}

/// Quote bare identifier keys: `{ticker: ...}` becomes `{"ticker": ...}`.
pub fn quote_unquoted_keys(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len() + 16);
    let mut copy_from = 0;
    let mut expect_key = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'"' => {
                expect_key = false;
                i = string_end(bytes, i).map_or(bytes.len(), |e| e + 1);
                continue;
            }
            b'{' | b',' => expect_key = true,
            _ if b.is_ascii_whitespace() => {}
            _ if expect_key && (b.is_ascii_alphabetic() || b == b'_') => {
                let len = bytes[i..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric() || **c == b'_')
                    .count();
                let after = text[i + len..].trim_start();
                if after.starts_with(':') {
                    out.push_str(&text[copy_from..i]);
                    out.push('"');
                    out.push_str(&text[i..i + len]);
                    out.push('"');
                    copy_from = i + len;
                }
                expect_key = false;
                i += len;
                continue;
            }
            _ => expect_key = false,
        }
        i += 1;
    }
    out.push_str(&text[copy_from..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unterminated_url_is_replaced() {
        let input = r#"{"url": "https://example.com/very/long/pa"#;
        assert_eq!(replace_truncated_urls(input), r#"{"url": "[truncated-url]""#);
    }

    #[test]
    fn ellipsis_url_is_replaced() {
        let input = r#"{"url": "https://example.com/...", "n": 1}"#;
        assert_eq!(
            replace_truncated_urls(input),
            r#"{"url": "[truncated-url]", "n": 1}"#
        );
    }

    #[test]
    fn complete_urls_are_kept() {
        let input = r#"{"url": "https://example.com/a", "note": "http is fine"}"#;
        assert_eq!(replace_truncated_urls(input), input);
    }

    #[test]
    fn trailing_separators() {
        assert_eq!(remove_trailing_separators("[1, 2, ]"), "[1, 2 ]");
        assert_eq!(remove_trailing_separators(r#"{"a": 1,}"#), r#"{"a": 1}"#);
        assert_eq!(remove_trailing_separators("[1,"), "[1");
        assert_eq!(remove_trailing_separators(r#"["a,]", 2]"#), r#"["a,]", 2]"#);
    }

    #[test]
    fn balances_nested_closers() {
        assert_eq!(balance_closers(r#"{"claims": [{"a": 1}"#), r#"{"claims": [{"a": 1}]}"#);
        assert_eq!(balance_closers(r#"{"claims": [{"a": "x"#), r#"{"claims": [{"a": "x"}]}"#);
        assert_eq!(balance_closers(r#"{"a": [1, 2],"#), r#"{"a": [1, 2]}"#);
        assert_eq!(balance_closers("[1]"), "[1]");
    }

    #[test]
    fn quotes_bare_keys_only() {
        assert_eq!(
            quote_unquoted_keys(r#"{ticker: "BTC", confidence: 0.5}"#),
            r#"{"ticker": "BTC", "confidence": 0.5}"#
        );
        assert_eq!(
            quote_unquoted_keys(r#"{"note": "a, b: c", flag: true}"#),
            r#"{"note": "a, b: c", "flag": true}"#
        );
        // bare values are left alone
        assert_eq!(quote_unquoted_keys("[true, false]"), "[true, false]");
    }

    #[test]
    fn repair_pipeline() {
        let input = r#"{claims: [{ticker: "BTC", url: "https://x.io/pa"#;
        let fixed = repair(input);
        let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["claims"][0]["url"], TRUNCATED_URL);
    }
}
