//! Locate a JSON body inside free-form LLM output

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref JSON_BODY: Regex = Regex::new(r"(?s)\{.*\}").expect("valid regex");
}

/// Span from the first `{` to the last `}`, if any
pub fn locate_json_body(text: &str) -> Option<&str> {
    JSON_BODY.find(text).map(|m| m.as_str())
}
