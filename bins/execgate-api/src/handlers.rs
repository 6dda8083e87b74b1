// HTTP route handlers for the execution gateway

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use execgate_core::ratelimit::RateLimitInfo;
use execgate_core::types::{ExecutionMode, ExecutionRequest, TestCase};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{bearer_token, AuthenticatedUser};
use crate::AppState;

/// Resolve the caller or produce the 401 response. Authentication failures
/// are indistinguishable to the client whether the token is absent, expired
/// or malformed.
async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, Response> {
    let token = match bearer_token(headers) {
        Some(token) => token,
        None => return Err(unauthorized()),
    };
    match state.verifier.verify(token).await {
        Some(user) => Ok(user),
        None => Err(unauthorized()),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "success": false,
            "statusCode": 401,
            "error": "Unauthorized",
            "data": { "message": "Valid authentication token required" }
        })),
    )
        .into_response()
}

fn bad_request(message: &str, errors: Option<&[String]>) -> Response {
    let mut data = json!({ "message": message });
    if let Some(errors) = errors {
        data["errors"] = json!(errors);
    }
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "statusCode": 400,
            "error": "Invalid request",
            "data": data
        })),
    )
        .into_response()
}

/// Advertise the caller's standing on every rated response, 429 included.
fn with_rate_headers(mut response: Response, info: &RateLimitInfo) -> Response {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&info.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&info.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&info.reset.to_string()) {
        headers.insert("X-RateLimit-Reset", v);
    }
    if let Some(retry_after) = info.retry_after {
        if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
            headers.insert("Retry-After", v);
        }
    }
    response
}

/// POST /execute - Run user code, optionally against per-question test cases
pub async fn execute_code(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let user = match authenticate(&state, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let verdict = state.limiter.check_limit(&user.uid);
    if !verdict.allowed {
        let response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded",
                "message": "Too many requests. Please try again later.",
                "retryAfter": verdict.info.retry_after,
                "limit": verdict.info.limit,
                "reset": verdict.info.reset,
            })),
        )
            .into_response();
        return with_rate_headers(response, &verdict.info);
    }

    let validation = state.validator.validate(&body);
    if !validation.is_valid {
        return with_rate_headers(
            bad_request("Request validation failed", Some(&validation.errors)),
            &verdict.info,
        );
    }

    let request = match ExecutionRequest::from_value(&body, Some(user.uid.clone())) {
        Some(request) => request,
        None => {
            return with_rate_headers(bad_request("Invalid request format", None), &verdict.info)
        }
    };

    // Container-backed languages are gated on a per-user allowlist; judge
    // languages are open to any authenticated caller.
    let needs_sandbox = state
        .registry
        .get(&request.language)
        .map(|c| c.sandbox.is_some())
        .unwrap_or(false);
    if needs_sandbox && !state.authz.allows_sandbox(&user) {
        warn!(
            user_id = %user.uid,
            language = %request.language,
            "Sandbox language denied"
        );
        let response = (
            StatusCode::FORBIDDEN,
            Json(json!({
                "success": false,
                "statusCode": 403,
                "error": "Forbidden",
                "data": {
                    "message": format!("Not authorized for {} language access", request.language)
                }
            })),
        )
            .into_response();
        return with_rate_headers(response, &verdict.info);
    }

    let test_cases: Option<Vec<TestCase>> = match body.get("testCases") {
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(cases) => Some(cases),
            Err(_) => {
                return with_rate_headers(
                    bad_request("Invalid test case format", None),
                    &verdict.info,
                )
            }
        },
        None => None,
    };

    let (result, submission) = match test_cases {
        Some(cases) => {
            let mode = match body.get("mode").and_then(Value::as_str) {
                Some(m) if m.eq_ignore_ascii_case("SUBMIT") => ExecutionMode::Submit,
                _ => ExecutionMode::default(),
            };
            let outcome = state
                .orchestrator
                .execute_with_test_cases(&request, &cases, mode)
                .await;
            (outcome.result, outcome.submission)
        }
        None => (state.orchestrator.execute_code(&request).await, None),
    };

    if !result.success {
        let response = (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "statusCode": 500,
                "error": "Code execution failed",
                "data": {
                    "message": result.error,
                    "executionTime": result.execution_time_ms,
                    "language": result.language,
                }
            })),
        )
            .into_response();
        return with_rate_headers(response, &verdict.info);
    }

    info!(
        user_id = %user.uid,
        language = result.language.as_deref().unwrap_or("-"),
        execution_time_ms = result.execution_time_ms,
        test_results = result.test_results.len(),
        "Execution request served"
    );

    let mut data = json!(result);
    if let Some(record) = submission {
        data["submission"] = json!(record);
    }
    let response = (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "statusCode": 200,
            "data": data
        })),
    )
        .into_response();
    with_rate_headers(response, &verdict.info)
}

/// GET /languages - Supported language catalogue
pub async fn get_languages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let languages = state.registry.list();
    Json(json!({
        "success": true,
        "languages": languages,
        "count": languages.len(),
    }))
}

/// GET /health - Liveness and catalogue sanity
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let supported: Vec<String> = state
        .registry
        .list()
        .into_iter()
        .map(|c| c.identifier)
        .collect();
    let healthy = !supported.is_empty();
    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "supportedLanguages": supported,
            "service": "execgate",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// GET /rate-limit - The caller's current rate-limit standing
pub async fn rate_limit_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let user = match authenticate(&state, &headers).await {
        Ok(user) => user,
        Err(response) => return response,
    };

    let info = state.limiter.status(&user.uid);
    Json(json!({
        "success": true,
        "rateLimit": info,
        "userId": user.uid,
    }))
    .into_response()
}
