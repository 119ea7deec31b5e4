//! Value Objects

use crate::error::{CredentialError, CredentialResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Stable identifier of an identity, derived from one of its secrets
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of an identity file (without the `.json` extension)
///
/// ASCII letters, digits, `_`, `-` and `.`; must not start with a dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityFileName(String);

static FILE_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9_.-]{0,63}$").expect("file name pattern is valid")
});

impl IdentityFileName {
    pub fn parse(name: &str) -> CredentialResult<Self> {
        let name = name.strip_suffix(".json").unwrap_or(name);
        if !FILE_NAME_PATTERN.is_match(name) || name.contains("..") {
            return Err(CredentialError::InvalidIdentity(format!(
                "invalid identity file name: {name:?}"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for IdentityFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Post,
    Reel,
    Tv,
}

impl TargetKind {
    /// URL path segment
    pub fn path_segment(&self) -> &'static str {
        match self {
            TargetKind::Post => "p",
            TargetKind::Reel => "reel",
            TargetKind::Tv => "tv",
        }
    }
}

/// A content item on the platform, addressed by shortcode
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub shortcode: String,
}

static TARGET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?[^/\s]+(?:/[A-Za-z0-9_.]+)?/(p|reels?|tv)/([A-Za-z0-9_-]+)(?:[/?#]|$)")
        .expect("target pattern is valid")
});

impl TargetRef {
    /// Parse a content URL (`/p/{code}/`, `/reel/{code}/`, `/tv/{code}/`), scheme optional
    pub fn parse(url: &str) -> CredentialResult<Self> {
        let url = url.trim();
        let captures = TARGET_PATTERN
            .captures(url)
            .ok_or_else(|| CredentialError::InvalidTarget(format!("unrecognized URL: {url}")))?;

        let kind = match &captures[1] {
            "p" => TargetKind::Post,
            "reel" | "reels" => TargetKind::Reel,
            _ => TargetKind::Tv,
        };

        Ok(Self {
            kind,
            shortcode: captures[2].to_string(),
        })
    }

    /// Canonical content URL under `base_url`
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}/",
            base_url.trim_end_matches('/'),
            self.kind.path_segment(),
            self.shortcode
        )
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}/", self.kind.path_segment(), self.shortcode)
    }
}

/// Outcome class of a failed platform call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Platform suspects automation on this identity
    Challenge,
    /// "Please wait" / 429
    RateLimited,
    /// Session expired or rejected
    Unauthorized,
    /// 404; often transient on this platform
    NotFound,
    /// Timeouts, 5xx, connection errors, unreadable bodies
    Transient,
    /// Malformed input or permanently invalid target
    Invalid,
}

const CHALLENGE_PATTERNS: &[&str] = &[
    "challenge_required",
    "checkpoint_required",
    "feedback_required",
    "login_required",
    "challenge",
    "checkpoint",
    "suspicious",
];

const RATE_LIMIT_PATTERNS: &[&str] = &[
    "please wait",
    "rate limit",
    "rate-limit",
    "ratelimit",
    "too many requests",
    "429",
];

const UNAUTHORIZED_PATTERNS: &[&str] = &[
    "unauthorized",
    "not logged in",
    "session expired",
    "forbidden",
    "401",
    "403",
];

const NOT_FOUND_PATTERNS: &[&str] = &["not found", "does not exist", "404"];

const INVALID_PATTERNS: &[&str] = &[
    "invalid url",
    "invalid target",
    "malformed",
    "unsupported url",
];

impl FailureClass {
    /// Only `Invalid` aborts the retry loop
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FailureClass::Invalid)
    }

    /// Whether the failure is tied to the identity that was used, so the same
    /// call should move on to a different identity
    pub fn is_identity_specific(&self) -> bool {
        matches!(
            self,
            FailureClass::Challenge | FailureClass::RateLimited | FailureClass::Unauthorized
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Challenge => "challenge",
            FailureClass::RateLimited => "rate_limited",
            FailureClass::Unauthorized => "unauthorized",
            FailureClass::NotFound => "not_found",
            FailureClass::Transient => "transient",
            FailureClass::Invalid => "invalid",
        }
    }

    /// Classify free-form failure text. First matching list wins; anything
    /// unrecognised is `Transient`.
    pub fn classify_message(text: &str) -> Self {
        let text = text.to_ascii_lowercase();
        let table: [(&[&str], FailureClass); 5] = [
            (CHALLENGE_PATTERNS, FailureClass::Challenge),
            (RATE_LIMIT_PATTERNS, FailureClass::RateLimited),
            (UNAUTHORIZED_PATTERNS, FailureClass::Unauthorized),
            (NOT_FOUND_PATTERNS, FailureClass::NotFound),
            (INVALID_PATTERNS, FailureClass::Invalid),
        ];

        table
            .iter()
            .find(|(patterns, _)| patterns.iter().any(|p| text.contains(p)))
            .map(|(_, class)| *class)
            .unwrap_or(FailureClass::Transient)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure returned by one unit of platform work
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{class}: {message}")]
pub struct PlatformFailure {
    pub class: FailureClass,
    pub message: String,
}

impl PlatformFailure {
    pub fn new(class: FailureClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    /// Classify `message` with [`FailureClass::classify_message`]
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            class: FailureClass::classify_message(&message),
            message,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureClass::Transient, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parse_shapes() {
        let t = TargetRef::parse("https://www.instagram.com/p/CxYz123_-a/").unwrap();
        assert_eq!(t.kind, TargetKind::Post);
        assert_eq!(t.shortcode, "CxYz123_-a");

        let t = TargetRef::parse("https://instagram.com/reel/AbC9?igsh=xyz").unwrap();
        assert_eq!(t.kind, TargetKind::Reel);
        assert_eq!(t.shortcode, "AbC9");

        let t = TargetRef::parse("https://www.instagram.com/reels/AbC9/").unwrap();
        assert_eq!(t.kind, TargetKind::Reel);

        let t = TargetRef::parse("  https://www.instagram.com/tv/Q1w2E3/  ").unwrap();
        assert_eq!(t.kind, TargetKind::Tv);

        let t = TargetRef::parse("https://www.instagram.com/someuser/p/Zz9/").unwrap();
        assert_eq!(t.shortcode, "Zz9");

        let t = TargetRef::parse("www.instagram.com/p/ABC123/").unwrap();
        assert_eq!(t.kind, TargetKind::Post);
        assert_eq!(t.shortcode, "ABC123");

        let t = TargetRef::parse("instagram.com/reel/XyZ_9/").unwrap();
        assert_eq!(t.kind, TargetKind::Reel);
        assert_eq!(t.shortcode, "XyZ_9");
    }

    #[test]
    fn test_target_parse_rejects_garbage() {
        for url in [
            "",
            "not a url",
            "https://www.instagram.com/",
            "https://www.instagram.com/stories/user/123/",
            "ftp://www.instagram.com/p/abc/",
            "https://www.instagram.com/p//",
        ] {
            assert!(
                matches!(TargetRef::parse(url), Err(CredentialError::InvalidTarget(_))),
                "{url:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_target_url_and_display() {
        let t = TargetRef::parse("https://www.instagram.com/reel/AbC9/").unwrap();
        assert_eq!(
            t.url("https://www.instagram.com/"),
            "https://www.instagram.com/reel/AbC9/"
        );
        assert_eq!(t.to_string(), "/reel/AbC9/");
    }

    #[test]
    fn test_identity_file_name() {
        assert_eq!(
            IdentityFileName::parse("account1.json").unwrap().file_name(),
            "account1.json"
        );
        assert!(IdentityFileName::parse("account_2-b").is_ok());
        for bad in ["", "../etc/passwd", ".hidden", "a/b", "a..b", "sp ace"] {
            assert!(IdentityFileName::parse(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_classify_message_first_match_wins() {
        assert_eq!(
            FailureClass::classify_message("challenge_required"),
            FailureClass::Challenge
        );
        assert_eq!(
            FailureClass::classify_message("Please wait a few minutes before you try again."),
            FailureClass::RateLimited
        );
        assert_eq!(
            FailureClass::classify_message("401 Unauthorized"),
            FailureClass::Unauthorized
        );
        assert_eq!(
            FailureClass::classify_message("Post does not exist"),
            FailureClass::NotFound
        );
        assert_eq!(
            FailureClass::classify_message("Malformed shortcode"),
            FailureClass::Invalid
        );
        assert_eq!(
            FailureClass::classify_message("connection reset by peer"),
            FailureClass::Transient
        );
        // login_required is a challenge signal even though it mentions login
        assert_eq!(
            FailureClass::classify_message("login_required: 401"),
            FailureClass::Challenge
        );
    }

    #[test]
    fn test_failure_class_properties() {
        assert!(!FailureClass::Invalid.is_retryable());
        assert!(FailureClass::NotFound.is_retryable());
        assert!(FailureClass::Challenge.is_identity_specific());
        assert!(FailureClass::RateLimited.is_identity_specific());
        assert!(FailureClass::Unauthorized.is_identity_specific());
        assert!(!FailureClass::Transient.is_identity_specific());
        assert!(!FailureClass::NotFound.is_identity_specific());
    }

    #[test]
    fn test_platform_failure_display() {
        let f = PlatformFailure::from_message("Please wait");
        assert_eq!(f.class, FailureClass::RateLimited);
        assert_eq!(f.to_string(), "rate_limited: Please wait");
    }
}
