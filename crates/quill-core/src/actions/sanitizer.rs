//! Strips conversational wrapping from model output before it goes into a document.

use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_PREAMBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^(here('s| is|'re)|i('ve| have)|i('ll| will)|i (can|could)|let me|sure|certainly|absolutely|of course).*?:\s*",
    )
    .expect("preamble regex")
});

static TRAILING_OFFER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\n\nwould you like .*$").expect("offer regex"));

static TRAILING_NARRATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\n\n(here('s| is|'re)|i('ve| have)|i('ll| will)) .*?\.\s*$")
        .expect("narration regex")
});

static TRAILING_CHECK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\n\n(does this|how does this|is this|would this) .*$").expect("check regex")
});

/// Removes "Here is ...:" preambles and trailing offers, narration and
/// "does this look good?" questions, then trims.
pub fn sanitize_content(raw: &str) -> String {
    let mut content = LEADING_PREAMBLE.replace(raw, "").into_owned();
    content = TRAILING_OFFER.replace(&content, "").into_owned();
    content = TRAILING_NARRATION.replace(&content, "").into_owned();
    content = TRAILING_CHECK.replace(&content, "").into_owned();
    content.trim().to_string()
}
