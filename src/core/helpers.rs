use std::collections::HashSet;
use std::sync::OnceLock;

use ammonia::Builder;
use regex::Regex;

use crate::core::errors::ApiError;

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Strips all HTML, leaving plain text.
///
/// ammonia serializes back to HTML, so the entities it emits for `&` and `<`
/// are decoded again; callers store and measure the decoded text.
pub fn sanitize_text(text: &str) -> String {
    let cleaned = Builder::default()
        .tags(HashSet::new())
        .clean(text)
        .to_string();
    html_escape::decode_html_entities(&cleaned).into_owned()
}

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Regex should compile")
    })
}

pub fn validate_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// Reads a required, non-blank string field from a JSON body.
pub fn required_str<'a>(value: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    value[field].as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Reads a required integer id from a JSON body. Ids start at 1, so zero counts as absent.
pub fn required_id(value: &serde_json::Value, field: &str) -> Option<i64> {
    value[field].as_i64().filter(|id| *id > 0)
}

pub fn check_length(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::BadRequest(format!("{} must be at most {} characters", field, max)));
    }
    Ok(())
}
