//! Client for the external judging API.
//!
//! Two-phase protocol: POST the submission and receive an opaque token, then
//! poll the token until the reported status is terminal. Only the
//! "still running" case is retried -- any transport or HTTP failure during
//! submit or poll is a hard error.

use crate::error::GatewayError;
use crate::orchestrator::JudgeBackend;
use crate::types::{JudgeResponse, JudgeSubmission, JudgeToken};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, warn};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_POLL_ATTEMPTS: u32 = 30;

#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

pub struct JudgeClient {
    http: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl JudgeClient {
    pub fn new(config: &JudgeConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|e| GatewayError::Internal(format!("invalid judge API key: {e}")))?;
            headers.insert("X-RapidAPI-Key", value);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .default_headers(headers)
            .build()?;

        Ok(JudgeClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: POLL_INTERVAL,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
        })
    }

    /// Override the polling budget. Tests use millisecond intervals so the
    /// timeout path does not sleep for 30 real seconds.
    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_poll_attempts = max_attempts;
        self
    }

    /// Submit source + params; returns the judge's opaque submission token.
    pub async fn submit(&self, submission: &JudgeSubmission) -> Result<String, GatewayError> {
        let token: JudgeToken = self
            .http
            .post(format!("{}/submissions", self.base_url))
            .json(submission)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(token = %token.token, "Submission accepted by judge");
        Ok(token.token)
    }

    /// Fetch the current state of a submission. Non-2xx is a hard error.
    pub async fn poll(&self, token: &str) -> Result<JudgeResponse, GatewayError> {
        let response = self
            .http
            .get(format!("{}/submissions/{}", self.base_url, token))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response)
    }

    /// Submit and poll until the judge reports a terminal status, or fail
    /// with a client-side timeout once the polling budget is spent. The
    /// client-side timeout is distinct from the judge's own TLE verdict,
    /// which arrives as a normal terminal response.
    pub async fn execute(&self, submission: &JudgeSubmission) -> Result<JudgeResponse, GatewayError> {
        let token = self.submit(submission).await?;

        for attempt in 0..self.max_poll_attempts {
            let result = self.poll(&token).await?;
            if result.status.is_terminal() {
                debug!(
                    token = %token,
                    attempts = attempt + 1,
                    status = %result.status.description,
                    "Judge reported terminal status"
                );
                return Ok(result);
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        let budget = self.poll_interval.as_secs() * u64::from(self.max_poll_attempts);
        warn!(token = %token, attempts = self.max_poll_attempts, "Judge polling budget exhausted");
        Err(GatewayError::ExecutionTimeout(budget.max(1)))
    }

    /// Passthrough for the judge's own language catalogue.
    pub async fn languages(&self) -> Result<Vec<serde_json::Value>, GatewayError> {
        let languages = self
            .http
            .get(format!("{}/languages", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(languages)
    }
}

#[async_trait]
impl JudgeBackend for JudgeClient {
    async fn execute(&self, submission: &JudgeSubmission) -> Result<JudgeResponse, GatewayError> {
        JudgeClient::execute(self, submission).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> JudgeSubmission {
        JudgeSubmission {
            source_code: "print('hi')".into(),
            language_id: 71,
            stdin: String::new(),
            cpu_time_limit: 5.0,
            memory_limit: 512_000,
            enable_network: false,
        }
    }

    fn client_for(server: &mockito::ServerGuard) -> JudgeClient {
        JudgeClient::new(&JudgeConfig {
            base_url: server.url(),
            api_key: None,
            timeout_ms: 5_000,
        })
        .expect("client builds")
        .with_polling(Duration::from_millis(1), 5)
    }

    #[tokio::test]
    async fn executes_submission_to_terminal_status() {
        let mut server = mockito::Server::new_async().await;
        let submit = server
            .mock("POST", "/submissions")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"tok-1"}"#)
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/submissions/tok-1")
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "stdout": "Hello, World!\n",
                    "time": "0.02",
                    "memory": 3072,
                    "stderr": null,
                    "compile_output": null,
                    "message": null,
                    "status": {"id": 3, "description": "Accepted"}
                }"#,
            )
            .create_async()
            .await;

        let result = client_for(&server)
            .execute(&submission())
            .await
            .expect("terminal response");

        assert_eq!(result.status.id, 3);
        assert_eq!(result.status.description, "Accepted");
        assert_eq!(result.stdout.as_deref(), Some("Hello, World!\n"));
        submit.assert_async().await;
        poll.assert_async().await;
    }

    #[tokio::test]
    async fn exhausted_polling_budget_is_a_timeout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/submissions")
            .with_status(201)
            .with_body(r#"{"token":"tok-2"}"#)
            .create_async()
            .await;
        let still_running = server
            .mock("GET", "/submissions/tok-2")
            .with_body(
                r#"{
                    "stdout": null, "time": null, "memory": null,
                    "stderr": null, "compile_output": null, "message": null,
                    "status": {"id": 2, "description": "Processing"}
                }"#,
            )
            .expect(5)
            .create_async()
            .await;

        let err = client_for(&server)
            .execute(&submission())
            .await
            .expect_err("must time out");

        assert!(matches!(err, GatewayError::ExecutionTimeout(_)));
        still_running.assert_async().await;
    }

    #[tokio::test]
    async fn submit_failure_is_a_hard_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/submissions")
            .with_status(500)
            .create_async()
            .await;

        let err = client_for(&server)
            .execute(&submission())
            .await
            .expect_err("5xx at submit must fail");

        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[tokio::test]
    async fn poll_failure_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/submissions")
            .with_status(201)
            .with_body(r#"{"token":"tok-3"}"#)
            .create_async()
            .await;
        let failing_poll = server
            .mock("GET", "/submissions/tok-3")
            .with_status(502)
            .expect(1)
            .create_async()
            .await;

        let err = client_for(&server)
            .execute(&submission())
            .await
            .expect_err("poll failure must propagate");

        assert!(matches!(err, GatewayError::Transport(_)));
        failing_poll.assert_async().await;
    }
}
