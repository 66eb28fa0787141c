//! Action marker parsing
//!
//! A model reply may open with `[ACTION:<type> key:value ...]` followed by the content
//! meant for the document. Only the first marker counts. Parameters may come in any
//! order, separated by whitespace or commas, and values may be double-quoted.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core_types::{ActionIntent, ActionKind};

static MARKER: Lazy<Regex> = Lazy::new(|| {
    // A quote that never closes is an ordinary character
    Regex::new(r#"(?i)\[ACTION:(write|create|delete|remove_content)\b((?:"[^"]*"|[^\]"]|")*)\]"#)
        .expect("action marker regex")
});

static PARAM_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[\s,])(filename|pattern|startline|endline)\s*:")
        .expect("action parameter regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub intent: ActionIntent,
    /// Reply text with the marker token removed; content after it is kept.
    pub stripped_text: String,
}

/// Extracts an action intent from a finished model reply.
pub trait IntentParser: Send + Sync {
    fn parse(&self, response: &str) -> ParsedResponse;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerParser;

impl MarkerParser {
    pub fn new() -> Self {
        Self
    }
}

impl IntentParser for MarkerParser {
    fn parse(&self, response: &str) -> ParsedResponse {
        let Some(captures) = MARKER.captures(response) else {
            return ParsedResponse {
                intent: ActionIntent::none(),
                stripped_text: response.to_string(),
            };
        };

        let marker = captures.get(0).expect("whole match");
        let kind = captures
            .get(1)
            .and_then(|m| ActionKind::from_marker(m.as_str()))
            .unwrap_or(ActionKind::None);
        let params = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

        let mut intent = ActionIntent::none();
        intent.kind = kind;
        for (key, value) in split_params(params) {
            match key.as_str() {
                "filename" => intent.filename = Some(value),
                "pattern" => intent.pattern = Some(value),
                "startline" => intent.start_line = parse_line_number(&value),
                "endline" => intent.end_line = parse_line_number(&value),
                _ => {}
            }
        }

        let content = response[marker.end()..].trim();
        if !content.is_empty() {
            intent.content = Some(content.to_string());
        }

        let mut stripped = String::with_capacity(response.len());
        stripped.push_str(&response[..marker.start()]);
        stripped.push_str(&response[marker.end()..]);

        log::debug!(
            "Parsed action marker '{}' as {:?}",
            marker.as_str(),
            intent.kind
        );

        ParsedResponse {
            intent,
            stripped_text: stripped.trim().to_string(),
        }
    }
}

/// Splits the parameter section into lowercase keys and cleaned values.
fn split_params(params: &str) -> Vec<(String, String)> {
    let quoted = quoted_spans(params);
    let keys: Vec<(usize, usize, String)> = PARAM_KEY
        .captures_iter(params)
        .filter_map(|cap| {
            let key = cap.get(1)?;
            let whole = cap.get(0)?;
            if quoted.iter().any(|(s, e)| key.start() > *s && key.start() < *e) {
                return None;
            }
            Some((key.start(), whole.end(), key.as_str().to_ascii_lowercase()))
        })
        .collect();

    keys.iter()
        .enumerate()
        .filter_map(|(i, (_, value_start, key))| {
            let value_end = keys.get(i + 1).map(|next| next.0).unwrap_or(params.len());
            let value = clean_value(&params[*value_start..value_end]);
            if value.is_empty() {
                None
            } else {
                Some((key.clone(), value))
            }
        })
        .collect()
}

fn quoted_spans(text: &str) -> Vec<(usize, usize)> {
    let quotes: Vec<usize> = text.match_indices('"').map(|(i, _)| i).collect();
    quotes.chunks(2).filter(|pair| pair.len() == 2).map(|pair| (pair[0], pair[1])).collect()
}

fn clean_value(raw: &str) -> String {
    let value = raw.trim().trim_end_matches(',').trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

/// Wire line numbers are 1-indexed; anything else is treated as absent.
fn parse_line_number(value: &str) -> Option<usize> {
    match value.parse::<usize>() {
        Ok(n) if n >= 1 => Some(n - 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedResponse {
        MarkerParser::new().parse(text)
    }

    #[test]
    fn test_create_with_content() {
        let parsed = parse("[ACTION:create filename:recipes.md]Ingredients: eggs");
        assert_eq!(parsed.intent.kind, ActionKind::Create);
        assert_eq!(parsed.intent.filename.as_deref(), Some("recipes.md"));
        assert_eq!(parsed.intent.content.as_deref(), Some("Ingredients: eggs"));
        assert_eq!(parsed.stripped_text, "Ingredients: eggs");
        assert!(!parsed.stripped_text.contains("[ACTION"));
    }

    #[test]
    fn test_no_marker_is_unchanged() {
        let text = "  Just a normal answer.\n";
        let parsed = parse(text);
        assert!(parsed.intent.is_none());
        assert_eq!(parsed.stripped_text, text);
    }

    #[test]
    fn test_parameters_in_any_order() {
        let parsed =
            parse("[ACTION:remove_content endLine:4, pattern:\"old, stale\" filename:todo.md startLine:2]");
        let intent = parsed.intent;
        assert_eq!(intent.kind, ActionKind::RemoveContent);
        assert_eq!(intent.filename.as_deref(), Some("todo.md"));
        assert_eq!(intent.pattern.as_deref(), Some("old, stale"));
        assert_eq!(intent.start_line, Some(1));
        assert_eq!(intent.end_line, Some(3));
        assert!(intent.content.is_none());
    }

    #[test]
    fn test_comma_separated_wire_order() {
        let parsed = parse("[ACTION:remove_content filename:notes.md, pattern:loops, startLine:3, endLine:5]");
        assert_eq!(parsed.intent.filename.as_deref(), Some("notes.md"));
        assert_eq!(parsed.intent.pattern.as_deref(), Some("loops"));
        assert_eq!(parsed.intent.start_line, Some(2));
        assert_eq!(parsed.intent.end_line, Some(4));
    }

    #[test]
    fn test_filename_with_spaces() {
        let parsed = parse("[ACTION:write filename:Meeting Notes.md]- item");
        assert_eq!(parsed.intent.filename.as_deref(), Some("Meeting Notes.md"));
        assert_eq!(parsed.intent.content.as_deref(), Some("- item"));
    }

    #[test]
    fn test_only_first_marker_counts() {
        let parsed = parse("[ACTION:delete filename:a.md] and [ACTION:delete filename:b.md]");
        assert_eq!(parsed.intent.filename.as_deref(), Some("a.md"));
        assert_eq!(
            parsed.intent.content.as_deref(),
            Some("and [ACTION:delete filename:b.md]")
        );
    }

    #[test]
    fn test_text_before_marker_is_not_content() {
        let parsed = parse("Sure thing.\n[ACTION:write]New line");
        assert_eq!(parsed.intent.kind, ActionKind::Write);
        assert_eq!(parsed.intent.content.as_deref(), Some("New line"));
        assert_eq!(parsed.stripped_text, "Sure thing.\nNew line");
    }

    #[test]
    fn test_marker_type_is_case_insensitive() {
        let parsed = parse("[action:DELETE filename:x.md]");
        assert_eq!(parsed.intent.kind, ActionKind::Delete);
    }

    #[test]
    fn test_invalid_line_numbers_are_absent() {
        let parsed = parse("[ACTION:remove_content startLine:0 endLine:abc]");
        assert_eq!(parsed.intent.start_line, None);
        assert_eq!(parsed.intent.end_line, None);
    }

    #[test]
    fn test_unpaired_quote_in_value() {
        let parsed = parse("[ACTION:write filename:Bob\"s notes.md]- item");
        assert_eq!(parsed.intent.kind, ActionKind::Write);
        assert_eq!(parsed.intent.filename.as_deref(), Some("Bob\"s notes.md"));
        assert_eq!(parsed.stripped_text, "- item");
    }

    #[test]
    fn test_unknown_type_is_not_a_marker() {
        let text = "[ACTION:rename filename:x.md]";
        let parsed = parse(text);
        assert!(parsed.intent.is_none());
        assert_eq!(parsed.stripped_text, text);
    }
}
