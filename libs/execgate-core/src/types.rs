use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A validated execution request. Constructed by the HTTP layer only after
/// the raw payload has passed the request validator; immutable afterwards.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub code: String,
    pub language: String,
    pub question_id: String,
    pub input: Option<String>,
    pub user_id: Option<String>,
}

impl ExecutionRequest {
    /// Build a request from an already-validated JSON body. Returns `None`
    /// if the body does not have the validated shape (defensive double-check
    /// at the controller boundary).
    pub fn from_value(body: &serde_json::Value, user_id: Option<String>) -> Option<Self> {
        let obj = body.as_object()?;
        Some(Self {
            code: obj.get("code")?.as_str()?.to_string(),
            language: obj.get("language")?.as_str()?.to_string(),
            question_id: obj.get("questionId")?.as_str()?.to_string(),
            input: obj.get("input").and_then(|v| v.as_str()).map(str::to_string),
            user_id,
        })
    }
}

/// How many test cases an execution covers.
///
/// RUN evaluates a bounded sample prefix; SUBMIT evaluates every case and
/// additionally produces an immutable [`SubmissionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Run { sample_limit: usize },
    Submit,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Run {
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

/// Number of test cases a RUN-mode execution samples.
pub const DEFAULT_SAMPLE_LIMIT: usize = 2;

/// A named (input, expected-output) pair. The file fields are opaque
/// fetchable references owned by an external content store; the gateway
/// resolves them through a [`crate::content::TestCaseFetcher`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub description: String,
    pub input_file: String,
    pub expected_file: String,
}

/// Verdict for a single test case. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_case: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
}

/// Aggregate outcome of one execution. Always structurally complete:
/// callers check `success`, never the presence of fields.
///
/// `success` means the judging pipeline completed, not that the user's
/// program was correct -- a program that wrote to stderr still yields
/// `success: true` with a non-null `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    #[serde(rename = "executionTime")]
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(rename = "testResults", default, skip_serializing_if = "Vec::is_empty")]
    pub test_results: Vec<TestResult>,
}

impl ExecutionResult {
    pub fn failure(error: String, execution_time_ms: u64, language: String) -> Self {
        ExecutionResult {
            success: false,
            output: String::new(),
            error: Some(error),
            execution_time_ms,
            memory: None,
            status: None,
            language: Some(language),
            test_results: Vec::new(),
        }
    }
}

/// Immutable record of a SUBMIT-mode evaluation. The gateway only creates
/// it; persisting and displaying the record is the caller's concern.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub question_id: String,
    pub language: String,
    pub passed: usize,
    pub total: usize,
    pub created_at: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn new(request: &ExecutionRequest, results: &[TestResult]) -> Self {
        SubmissionRecord {
            id: Uuid::new_v4(),
            question_id: request.question_id.clone(),
            language: request.language.clone(),
            passed: results.iter().filter(|r| r.passed).count(),
            total: results.len(),
            created_at: Utc::now(),
        }
    }
}

// Judge wire types. Field names follow the judge API, not Rust convention.

#[derive(Debug, Clone, Serialize)]
pub struct JudgeSubmission {
    pub source_code: String,
    pub language_id: u32,
    pub stdin: String,
    pub cpu_time_limit: f32,
    pub memory_limit: u32,
    pub enable_network: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JudgeToken {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JudgeStatus {
    pub id: i32,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JudgeResponse {
    pub stdout: Option<String>,
    pub time: Option<String>,
    pub memory: Option<u32>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub message: Option<String>,
    pub status: JudgeStatus,
}

impl JudgeStatus {
    /// Status ids below 3 ("In Queue", "Processing") mean the submission is
    /// still running; everything at or above 3 is terminal.
    pub fn is_terminal(&self) -> bool {
        self.id >= 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_from_validated_body() {
        let body = json!({
            "code": "print(1)",
            "language": "python",
            "questionId": "q-001",
            "input": "5",
        });

        let request = ExecutionRequest::from_value(&body, Some("user-1".into()))
            .expect("validated body must convert");

        assert_eq!(request.code, "print(1)");
        assert_eq!(request.language, "python");
        assert_eq!(request.question_id, "q-001");
        assert_eq!(request.input.as_deref(), Some("5"));
        assert_eq!(request.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn request_from_non_object_is_none() {
        assert!(ExecutionRequest::from_value(&json!("nope"), None).is_none());
        assert!(ExecutionRequest::from_value(&json!({ "code": "x" }), None).is_none());
    }

    #[test]
    fn judge_status_terminal_threshold() {
        let running = JudgeStatus { id: 2, description: "Processing".into() };
        let accepted = JudgeStatus { id: 3, description: "Accepted".into() };
        let tle = JudgeStatus { id: 5, description: "Time Limit Exceeded".into() };

        assert!(!running.is_terminal());
        assert!(accepted.is_terminal());
        assert!(tle.is_terminal());
    }

    #[test]
    fn submission_record_counts_passes() {
        let request = ExecutionRequest {
            code: String::new(),
            language: "python".into(),
            question_id: "q-7".into(),
            input: None,
            user_id: None,
        };
        let results = vec![
            TestResult {
                test_case: "a".into(),
                expected: "1".into(),
                actual: "1".into(),
                passed: true,
                input: None,
            },
            TestResult {
                test_case: "b".into(),
                expected: "2".into(),
                actual: "3".into(),
                passed: false,
                input: None,
            },
        ];

        let record = SubmissionRecord::new(&request, &results);
        assert_eq!(record.passed, 1);
        assert_eq!(record.total, 2);
        assert_eq!(record.question_id, "q-7");
    }
}
