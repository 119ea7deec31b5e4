//! Outbound Cookie Headers
//!
//! Builds the `Cookie` request header from a bag of name/value pairs.

use axum::http::HeaderValue;

/// A pair may appear in a `Cookie` header only if neither side can break
/// the header framing.
fn is_cookie_safe(name: &str, value: &str) -> bool {
    !name.is_empty()
        && !name.contains(['=', ';', ',', ' '])
        && !value.contains([';', ','])
        && name.chars().chain(value.chars()).all(|c| !c.is_control())
}

/// Join pairs into `name=value; name=value`, skipping unsafe pairs
pub fn build_cookie_header<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .filter(|(name, value)| {
            let safe = is_cookie_safe(name, value);
            if !safe {
                tracing::warn!(cookie = %name, "Skipping cookie with unsafe characters");
            }
            safe
        })
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// `Cookie` header value, or `None` when nothing usable remains
pub fn cookie_header_value<'a, I>(pairs: I) -> Option<HeaderValue>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let joined = build_cookie_header(pairs);
    if joined.is_empty() {
        return None;
    }
    HeaderValue::from_str(&joined).ok()
}
