//! HTTP Platform Client
//!
//! Fetches target metadata with an identity's session and turns every
//! response into either the JSON payload or a classified failure.

use crate::application::config::CredentialConfig;
use crate::domain::entities::{CSRF_SECRET, Identity};
use crate::domain::repository::PlatformClient;
use crate::domain::value_objects::{FailureClass, PlatformFailure, TargetRef};
use crate::error::{CredentialError, CredentialResult};
use axum::http::{HeaderValue, StatusCode, header};
use platform::handle_pool::HandlePool;
use platform::http_client::{HttpClientConfig, build_client};

/// Body markers the platform uses when it wants the session verified
const CHALLENGE_MARKERS: &[&str] = &[
    "challenge_required",
    "checkpoint_required",
    "feedback_required",
    "login_required",
];

const RATE_LIMIT_MARKERS: &[&str] = &["please wait", "rate limit", "too many requests"];

/// Platform client over a rotating set of `reqwest` clients
pub struct HttpPlatformClient {
    clients: HandlePool<reqwest::Client>,
    base_url: String,
}

impl HttpPlatformClient {
    pub fn new(config: &CredentialConfig) -> CredentialResult<Self> {
        let http = HttpClientConfig {
            timeout: config.request_timeout,
            ..HttpClientConfig::default()
        };
        let clients = HandlePool::build(config.client_pool_size, || build_client(&http))
            .map_err(|e| CredentialError::Internal(e.to_string()))?;

        tracing::info!(
            clients = clients.len(),
            base_url = %config.platform_base_url,
            "Platform client pool ready"
        );

        Ok(Self {
            clients,
            base_url: config.platform_base_url.clone(),
        })
    }
}

impl PlatformClient for HttpPlatformClient {
    async fn fetch(
        &self,
        identity: &Identity,
        target: &TargetRef,
    ) -> Result<serde_json::Value, PlatformFailure> {
        let client = self.clients.next().await;

        let mut request = client
            .get(target.url(&self.base_url))
            .query(&[("__a", "1"), ("__d", "dis")])
            .header(header::ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(cookie) = platform::cookie::cookie_header_value(identity.secret_pairs()) {
            request = request.header(header::COOKIE, cookie);
        }
        if let Some(csrf) = identity
            .secret(CSRF_SECRET)
            .and_then(|v| HeaderValue::from_str(v).ok())
        {
            request = request.header("X-CSRFToken", csrf);
        }

        let response = request.send().await.map_err(request_failure)?;
        let status = response.status();
        let final_path = response.url().path().to_string();
        let body = response.text().await.map_err(request_failure)?;

        let result = classify_response(status, &final_path, &body);
        if let Err(failure) = &result {
            tracing::debug!(
                identity_id = %identity.id,
                target = %target,
                status = status.as_u16(),
                class = %failure.class,
                "Platform call failed"
            );
        }
        result
    }
}

fn request_failure(e: reqwest::Error) -> PlatformFailure {
    if e.is_timeout() {
        PlatformFailure::transient("platform request timed out")
    } else if e.is_connect() {
        PlatformFailure::transient(format!("connection failed: {e}"))
    } else {
        PlatformFailure::transient(e.to_string())
    }
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

/// Map a platform response onto the payload or a failure class
///
/// Redirects to the challenge or login pages win over the status code.
/// Successful responses must carry JSON; `{"status": "fail"}` bodies are
/// classified by their message.
pub fn classify_response(
    status: StatusCode,
    final_path: &str,
    body: &str,
) -> Result<serde_json::Value, PlatformFailure> {
    if final_path.starts_with("/challenge") || final_path.contains("/checkpoint") {
        return Err(PlatformFailure::new(
            FailureClass::Challenge,
            format!("redirected to {final_path}"),
        ));
    }
    if final_path.starts_with("/accounts/login") {
        return Err(PlatformFailure::new(
            FailureClass::Unauthorized,
            "redirected to login",
        ));
    }

    if status.is_success() {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|_| PlatformFailure::transient("unreadable response body"))?;

        if value.get("status").and_then(|s| s.as_str()) == Some("fail") {
            let message = value
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("request failed");
            return Err(PlatformFailure::from_message(message));
        }
        return Ok(value);
    }

    let lowered = body.to_ascii_lowercase();
    let (class, message) = if contains_any(&lowered, CHALLENGE_MARKERS) {
        (FailureClass::Challenge, "challenge required".to_string())
    } else if status == StatusCode::TOO_MANY_REQUESTS || contains_any(&lowered, RATE_LIMIT_MARKERS)
    {
        (FailureClass::RateLimited, "please wait a few minutes".to_string())
    } else if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        (FailureClass::Unauthorized, format!("platform returned {status}"))
    } else if status == StatusCode::NOT_FOUND {
        (FailureClass::NotFound, "target not found".to_string())
    } else if status.is_server_error() {
        (FailureClass::Transient, format!("platform returned {status}"))
    } else {
        (FailureClass::Invalid, format!("platform returned {status}"))
    };

    Err(PlatformFailure::new(class, message))
}
