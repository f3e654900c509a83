use std::sync::OnceLock;

use regex::Regex;

/// Split text into alternating runs of whitespace and non-whitespace
///
/// Every token is non-empty and the tokens concatenate back to `text`
/// exactly. Whitespace follows the Unicode `White_Space` property.
pub fn tokenize(text: &str) -> Vec<&str> {
    fn whitespace() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"\s+").expect("must be valid regex"))
    }

    let mut tokens = Vec::new();
    let mut last_end = 0;

    for run in whitespace().find_iter(text) {
        if run.start() > last_end {
            tokens.push(&text[last_end..run.start()]);
        }
        tokens.push(run.as_str());
        last_end = run.end();
    }

    if last_end < text.len() {
        tokens.push(&text[last_end..]);
    }

    tokens
}
