// Bearer-token authentication and the sandbox-language allowlist

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Returns the user the token belongs to, or None when the token is
    /// missing, expired or otherwise unverifiable.
    async fn verify(&self, token: &str) -> Option<AuthenticatedUser>;
}

/// Verifies tokens against an external identity service.
pub struct RemoteTokenVerifier {
    http: reqwest::Client,
    verify_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    uid: String,
    email: Option<String>,
    #[serde(rename = "emailVerified", default)]
    email_verified: bool,
}

const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

impl RemoteTokenVerifier {
    pub fn new(verify_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()
            .expect("Failed to build token verification client");
        RemoteTokenVerifier { http, verify_url }
    }
}

#[async_trait]
impl TokenVerifier for RemoteTokenVerifier {
    async fn verify(&self, token: &str) -> Option<AuthenticatedUser> {
        let response = self
            .http
            .post(&self.verify_url)
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Token rejected by identity service");
            return None;
        }

        let verified: VerifyResponse = response.json().await.ok()?;
        Some(AuthenticatedUser {
            uid: verified.uid,
            email: verified.email,
            email_verified: verified.email_verified,
        })
    }
}

/// Extract the bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Who may run container-backed languages. Empty allowlist means nobody.
pub struct AuthorizationPolicy {
    allowed_emails: HashSet<String>,
}

impl AuthorizationPolicy {
    pub fn new(allowed_emails: HashSet<String>) -> Self {
        AuthorizationPolicy { allowed_emails }
    }

    pub fn allows_sandbox(&self, user: &AuthenticatedUser) -> bool {
        if !user.email_verified {
            return false;
        }
        user.email
            .as_deref()
            .map(|e| self.allowed_emails.contains(&e.to_lowercase()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(email: Option<&str>, verified: bool) -> AuthenticatedUser {
        AuthenticatedUser {
            uid: "u-1".into(),
            email: email.map(String::from),
            email_verified: verified,
        }
    }

    #[test]
    fn remote_verifier_builds_with_its_timeout() {
        let _ = RemoteTokenVerifier::new("http://127.0.0.1:1/verify".into());
    }

    #[test]
    fn extracts_bearer_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn rejects_malformed_authorization_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic abc123"),
        );
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer "),
        );
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn sandbox_allowlist_requires_verified_matching_email() {
        let policy =
            AuthorizationPolicy::new(["dev@example.com".to_string()].into_iter().collect());

        assert!(policy.allows_sandbox(&user(Some("dev@example.com"), true)));
        assert!(policy.allows_sandbox(&user(Some("Dev@Example.com"), true)));
        assert!(!policy.allows_sandbox(&user(Some("dev@example.com"), false)));
        assert!(!policy.allows_sandbox(&user(Some("other@example.com"), true)));
        assert!(!policy.allows_sandbox(&user(None, true)));
    }

    #[test]
    fn empty_allowlist_allows_nobody() {
        let policy = AuthorizationPolicy::new(HashSet::new());
        assert!(!policy.allows_sandbox(&user(Some("dev@example.com"), true)));
    }
}
