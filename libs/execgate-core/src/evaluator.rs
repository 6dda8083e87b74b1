//! Output normalization and test-case comparison.
//!
//! Knows nothing about Docker, the judge, or HTTP. Pure functions from
//! (actual output, expected output) to verdicts, so scoring is deterministic
//! regardless of which backend produced the bytes.

use crate::types::{ExecutionMode, TestResult};

/// Normalize program output before comparison: line endings folded to LF,
/// leading and trailing whitespace trimmed. Internal whitespace, empty lines
/// and case are preserved. Idempotent.
pub fn normalize(output: &str) -> String {
    output.replace("\r\n", "\n").trim().to_string()
}

/// Whether actual output matches expected output after normalization, so
/// line-ending or trailing-whitespace differences never fail a test.
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize(actual) == normalize(expected)
}

/// Roll a batch of test results up into the human-readable summary used as
/// the primary output field.
pub fn format_summary(results: &[TestResult], mode: ExecutionMode) -> String {
    if results.is_empty() {
        return "No test cases executed".to_string();
    }

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    let status_lines: Vec<String> = results
        .iter()
        .map(|r| {
            if r.passed {
                format!("✅ {}", r.test_case)
            } else {
                format!("❌ {}", r.test_case)
            }
        })
        .collect();

    let heading = match mode {
        ExecutionMode::Run { .. } => "Sample Test Results",
        ExecutionMode::Submit => "Full Evaluation Results",
    };

    format!(
        "{} ({}/{} passed):\n{}",
        heading,
        passed,
        total,
        status_lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(description: &str, passed: bool) -> TestResult {
        TestResult {
            test_case: description.to_string(),
            expected: String::new(),
            actual: String::new(),
            passed,
            input: None,
        }
    }

    #[test]
    fn normalize_trims_and_folds_line_endings() {
        assert_eq!(normalize("hello\n"), "hello");
        assert_eq!(normalize("  hello  "), "hello");
        assert_eq!(normalize("a\r\nb\r\n"), "a\nb");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n"), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in ["hello\r\n", "  a\r\nb  \n", "", "x", "line1\nline2\n"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn normalize_preserves_interior_content() {
        assert_eq!(normalize("a\n\nb"), "a\n\nb");
        assert_eq!(normalize("Hello"), "Hello");
        assert_ne!(normalize("Hello"), normalize("hello"));
    }

    #[test]
    fn matching_ignores_line_ending_differences() {
        assert!(outputs_match("line1\r\nline2\r\n", "line1\nline2"));
        assert!(outputs_match("  120  \n", "120"));
        assert!(!outputs_match("120", "121"));
    }

    #[test]
    fn summary_marks_each_case() {
        let results = vec![result("adds small numbers", true), result("handles zero", false)];

        let run = format_summary(&results, ExecutionMode::Run { sample_limit: 2 });
        assert_eq!(
            run,
            "Sample Test Results (1/2 passed):\n✅ adds small numbers\n❌ handles zero"
        );

        let submit = format_summary(&results, ExecutionMode::Submit);
        assert!(submit.starts_with("Full Evaluation Results (1/2 passed):"));
    }

    #[test]
    fn summary_with_no_results() {
        assert_eq!(
            format_summary(&[], ExecutionMode::Submit),
            "No test cases executed"
        );
    }
}
