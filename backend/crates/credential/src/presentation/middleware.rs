//! Admin Middleware
//!
//! Bearer-token gate for the administrative routes. With no token configured
//! every admin request is rejected.

use crate::error::CredentialError;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::crypto::constant_time_eq;
use std::sync::Arc;

/// Middleware state
#[derive(Debug, Clone, Default)]
pub struct AdminAuth {
    token: Option<Arc<str>>,
}

impl AdminAuth {
    /// Blank tokens count as unset
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .map(Arc::from),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    fn accepts(&self, presented: Option<&str>) -> bool {
        match (&self.token, presented) {
            (Some(expected), Some(presented)) => {
                constant_time_eq(expected.as_bytes(), presented.as_bytes())
            }
            _ => false,
        }
    }
}

fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Middleware that requires `Authorization: Bearer {ADMIN_TOKEN}`
pub async fn require_admin(
    State(auth): State<AdminAuth>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    if !auth.accepts(bearer_token(&req)) {
        return Err(CredentialError::Unauthorized.into_response());
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_only_matching_token() {
        let auth = AdminAuth::new(Some("s3cret".into()));
        assert!(auth.accepts(Some("s3cret")));
        assert!(!auth.accepts(Some("s3cre")));
        assert!(!auth.accepts(None));
    }

    #[test]
    fn test_blank_token_disables_admin() {
        let auth = AdminAuth::new(Some("   ".into()));
        assert!(!auth.is_enabled());
        assert!(!auth.accepts(Some("")));
        assert!(!AdminAuth::disabled().accepts(Some("anything")));
    }
}
