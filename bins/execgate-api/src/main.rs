mod auth;
mod config;
mod handlers;
mod routes;

use auth::{AuthorizationPolicy, RemoteTokenVerifier, TokenVerifier};
use axum::Router;
use config::ServiceConfig;
use execgate_core::content::HttpTestCaseFetcher;
use execgate_core::judge::JudgeClient;
use execgate_core::orchestrator::{ExecutionOrchestrator, SandboxBackend};
use execgate_core::ratelimit::{spawn_sweeper, RateLimiter};
use execgate_core::registry::LanguageRegistry;
use execgate_core::sandbox::SandboxRunner;
use execgate_core::validator::RequestValidator;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct AppState {
    pub orchestrator: ExecutionOrchestrator,
    pub registry: Arc<LanguageRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub validator: RequestValidator,
    pub authz: AuthorizationPolicy,
}

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Execution gateway booting...");

    let config = ServiceConfig::from_env();

    let registry = Arc::new(LanguageRegistry::with_defaults());
    info!(languages = registry.list().len(), "Language registry loaded");

    let judge = JudgeClient::new(&config.judge).expect("Failed to build judge client");
    info!(base_url = %config.judge.base_url, "Judge client configured");

    // A missing container engine degrades sandbox-profile languages to the
    // judge fallback instead of refusing to start.
    let sandbox: Option<Arc<dyn SandboxBackend>> = match SandboxRunner::new() {
        Ok(runner) => {
            info!("Container engine connected");
            Some(Arc::new(runner))
        }
        Err(e) => {
            warn!(error = %e, "Container engine unavailable, sandbox languages fall back to the judge");
            None
        }
    };

    let fetcher = HttpTestCaseFetcher::new(config.content_base_url.clone())
        .expect("Failed to build test case fetcher");

    let orchestrator = ExecutionOrchestrator::new(
        registry.clone(),
        Arc::new(judge),
        sandbox,
        Arc::new(fetcher),
    );

    let limiter = Arc::new(RateLimiter::new(config.rate_limit));
    let _sweeper = spawn_sweeper(limiter.clone());

    let state = Arc::new(AppState {
        orchestrator,
        registry,
        limiter,
        verifier: Arc::new(RemoteTokenVerifier::new(config.auth_verify_url.clone())),
        validator: RequestValidator::new(config.max_code_length),
        authz: AuthorizationPolicy::new(config.sandbox_authorized_users.clone()),
    });

    let app = Router::new().merge(routes::routes()).with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
