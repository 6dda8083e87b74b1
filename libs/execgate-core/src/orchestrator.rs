//! Execution entry point: backend selection, timing, result shaping and
//! per-test-case evaluation.
//!
//! The orchestrator is a total function over requests. Every backend
//! failure -- unsupported language, judge timeout, transport error, Docker
//! error -- is caught here and folded into a structurally complete
//! `ExecutionResult` with `success: false`. Nothing propagates to the HTTP
//! layer as an error value.

use crate::content::TestCaseFetcher;
use crate::error::GatewayError;
use crate::evaluator;
use crate::registry::{LanguageConfig, LanguageRegistry, SandboxProfile};
use crate::sandbox::SandboxOutput;
use crate::types::{
    ExecutionMode, ExecutionRequest, ExecutionResult, JudgeResponse, JudgeSubmission,
    SubmissionRecord, TestCase, TestResult,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Ceiling on any single backend call, independent of the judge client's
/// internal polling budget. A misbehaving backend cannot hang a request.
pub const CALL_DEADLINE: Duration = Duration::from_secs(60);

#[async_trait]
pub trait JudgeBackend: Send + Sync {
    async fn execute(&self, submission: &JudgeSubmission) -> Result<JudgeResponse, GatewayError>;
}

#[async_trait]
pub trait SandboxBackend: Send + Sync {
    async fn run(
        &self,
        profile: &SandboxProfile,
        source: &str,
        input: &str,
    ) -> Result<SandboxOutput, GatewayError>;
}

/// Backend-agnostic view of one program run, before result shaping.
struct BackendOutput {
    output: String,
    error: Option<String>,
    memory: Option<u32>,
    status: Option<String>,
}

/// A per-test-case evaluation plus the submission record SUBMIT mode
/// produces. Persisting the record is the caller's concern.
pub struct EvaluationOutcome {
    pub result: ExecutionResult,
    pub submission: Option<SubmissionRecord>,
}

pub struct ExecutionOrchestrator {
    registry: Arc<LanguageRegistry>,
    judge: Arc<dyn JudgeBackend>,
    sandbox: Option<Arc<dyn SandboxBackend>>,
    fetcher: Arc<dyn TestCaseFetcher>,
    call_deadline: Duration,
}

impl ExecutionOrchestrator {
    pub fn new(
        registry: Arc<LanguageRegistry>,
        judge: Arc<dyn JudgeBackend>,
        sandbox: Option<Arc<dyn SandboxBackend>>,
        fetcher: Arc<dyn TestCaseFetcher>,
    ) -> Self {
        ExecutionOrchestrator {
            registry,
            judge,
            sandbox,
            fetcher,
            call_deadline: CALL_DEADLINE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.call_deadline = deadline;
        self
    }

    /// One-shot execution against the request's own stdin.
    pub async fn execute_code(&self, request: &ExecutionRequest) -> ExecutionResult {
        let start = Instant::now();
        info!(
            language = %request.language,
            question_id = %request.question_id,
            code_len = request.code.len(),
            user_id = request.user_id.as_deref().unwrap_or("-"),
            "Starting code execution"
        );

        let outcome = async {
            let config = self.lookup(&request.language)?;
            let stdin = request.input.as_deref().unwrap_or("");
            self.run_backend(&config, &request.code, stdin)
                .await
                .map(|raw| (config, raw))
        }
        .await;

        let execution_time_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok((config, raw)) => {
                info!(
                    language = %config.identifier,
                    execution_time_ms,
                    status = raw.status.as_deref().unwrap_or("-"),
                    has_error = raw.error.is_some(),
                    "Code execution completed"
                );
                ExecutionResult {
                    success: true,
                    output: raw.output,
                    error: raw.error,
                    execution_time_ms,
                    memory: raw.memory,
                    status: raw.status,
                    language: Some(config.identifier),
                    test_results: Vec::new(),
                }
            }
            Err(e) => {
                error!(
                    language = %request.language,
                    execution_time_ms,
                    error = %e,
                    "Code execution failed"
                );
                ExecutionResult::failure(e.to_string(), execution_time_ms, request.language.clone())
            }
        }
    }

    /// Evaluate the request against per-question test cases: one isolated
    /// run per case, normalized stdout diffed against the expected file.
    /// RUN mode covers a bounded sample prefix; SUBMIT covers every case and
    /// yields an immutable submission record.
    pub async fn execute_with_test_cases(
        &self,
        request: &ExecutionRequest,
        test_cases: &[TestCase],
        mode: ExecutionMode,
    ) -> EvaluationOutcome {
        let start = Instant::now();

        let config = match self.lookup(&request.language) {
            Ok(config) => config,
            Err(e) => {
                return EvaluationOutcome {
                    result: ExecutionResult::failure(
                        e.to_string(),
                        start.elapsed().as_millis() as u64,
                        request.language.clone(),
                    ),
                    submission: None,
                };
            }
        };

        let scheduled = match mode {
            ExecutionMode::Run { sample_limit } => {
                &test_cases[..sample_limit.min(test_cases.len())]
            }
            ExecutionMode::Submit => test_cases,
        };

        let mut results = Vec::with_capacity(scheduled.len());
        for case in scheduled {
            results.push(self.evaluate_case(&config, request, case).await);
        }

        let output = evaluator::format_summary(&results, mode);
        let passed = results.iter().filter(|r| r.passed).count();
        info!(
            language = %config.identifier,
            question_id = %request.question_id,
            scheduled = scheduled.len(),
            passed,
            mode = ?mode,
            "Test case evaluation completed"
        );

        let result = ExecutionResult {
            success: true,
            output,
            error: None,
            execution_time_ms: start.elapsed().as_millis() as u64,
            memory: None,
            status: None,
            language: Some(config.identifier),
            test_results: results,
        };

        let submission = match mode {
            ExecutionMode::Submit => Some(SubmissionRecord::new(request, &result.test_results)),
            ExecutionMode::Run { .. } => None,
        };

        EvaluationOutcome { result, submission }
    }

    async fn evaluate_case(
        &self,
        config: &LanguageConfig,
        request: &ExecutionRequest,
        case: &TestCase,
    ) -> TestResult {
        let resolved = tokio::try_join!(
            self.fetcher.fetch(&case.input_file),
            self.fetcher.fetch(&case.expected_file),
        );

        let (input, expected) = match resolved {
            Ok(pair) => pair,
            Err(e) => {
                return TestResult {
                    test_case: case.description.clone(),
                    expected: "Error loading test case".to_string(),
                    actual: format!("Error: {e}"),
                    passed: false,
                    input: Some(String::new()),
                };
            }
        };

        match self.run_backend(config, &request.code, &input).await {
            Ok(raw) => {
                let passed =
                    raw.error.is_none() && evaluator::outputs_match(&raw.output, &expected);
                let actual = match &raw.error {
                    Some(e) => format!("Error: {e}"),
                    None => raw.output,
                };
                TestResult {
                    test_case: case.description.clone(),
                    expected,
                    actual,
                    passed,
                    input: Some(input),
                }
            }
            Err(e) => TestResult {
                test_case: case.description.clone(),
                expected,
                actual: format!("Error: {e}"),
                passed: false,
                input: Some(input),
            },
        }
    }

    fn lookup(&self, language: &str) -> Result<LanguageConfig, GatewayError> {
        self.registry
            .get(language)
            .ok_or_else(|| GatewayError::UnsupportedLanguage(language.to_string()))
    }

    /// Run one program against one stdin through whichever backend the
    /// language configuration selects, under the orchestrator's deadline.
    async fn run_backend(
        &self,
        config: &LanguageConfig,
        code: &str,
        stdin: &str,
    ) -> Result<BackendOutput, GatewayError> {
        let dispatch = async {
            if let (Some(profile), Some(sandbox)) = (&config.sandbox, &self.sandbox) {
                let out = sandbox.run(profile, code, stdin).await?;
                return Ok(BackendOutput {
                    output: out.output,
                    error: out.error,
                    memory: None,
                    status: None,
                });
            }

            // Sandbox-profile languages fall back to the judge when no
            // container engine is configured; the judge id still exists.
            let submission = JudgeSubmission {
                source_code: code.to_string(),
                language_id: config.id,
                stdin: stdin.to_string(),
                cpu_time_limit: config.cpu_time_limit,
                memory_limit: config.memory_limit_kb,
                enable_network: config.enable_network,
            };
            let response = self.judge.execute(&submission).await?;

            // Execution completing is distinct from the program succeeding:
            // stderr/compile_output become `error` while `success` stays true.
            Ok(BackendOutput {
                output: response.stdout.unwrap_or_default().trim().to_string(),
                error: response
                    .stderr
                    .filter(|s| !s.trim().is_empty())
                    .or(response.compile_output.filter(|s| !s.trim().is_empty())),
                memory: response.memory,
                status: Some(response.status.description),
            })
        };

        match tokio::time::timeout(self.call_deadline, dispatch).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::ExecutionTimeout(self.call_deadline.as_secs())),
        }
    }
}
