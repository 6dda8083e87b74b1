// Environment-driven service configuration

use execgate_core::judge::JudgeConfig;
use execgate_core::ratelimit::RateLimitConfig;
use execgate_core::validator::DEFAULT_MAX_CODE_LENGTH;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub judge: JudgeConfig,
    pub max_code_length: usize,
    pub rate_limit: RateLimitConfig,
    pub content_base_url: Option<String>,
    /// Verified emails allowed to use container-backed languages.
    pub sandbox_authorized_users: HashSet<String>,
    pub auth_verify_url: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let sandbox_authorized_users = std::env::var("SANDBOX_AUTHORIZED_USERS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        ServiceConfig {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            judge: JudgeConfig {
                base_url: std::env::var("JUDGE_BASE_URL")
                    .unwrap_or_else(|_| "https://judge0-ce.p.rapidapi.com".to_string()),
                api_key: std::env::var("JUDGE_API_KEY").ok(),
                timeout_ms: env_or("JUDGE_TIMEOUT_MS", 30_000),
            },
            max_code_length: env_or("MAX_CODE_LENGTH", DEFAULT_MAX_CODE_LENGTH),
            rate_limit: RateLimitConfig {
                window_ms: env_or("RATE_LIMIT_WINDOW_MS", 60_000),
                max_requests: env_or("RATE_LIMIT_MAX_REQUESTS", 30),
            },
            content_base_url: std::env::var("CONTENT_BASE_URL").ok(),
            sandbox_authorized_users,
            auth_verify_url: std::env::var("AUTH_VERIFY_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8085/verify".to_string()),
        }
    }
}
