use serde_json::Value;
use tracing::warn;

pub const DEFAULT_MAX_CODE_LENGTH: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Boundary validator for raw execution payloads. Rejects malformed
/// submissions before any backend resource is spent.
///
/// Field rules are checked independently and errors accumulate; only a
/// non-object body short-circuits, since field rules cannot apply to it.
/// Never panics and never returns an error -- the result object is total.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    max_code_length: usize,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CODE_LENGTH)
    }
}

impl RequestValidator {
    pub fn new(max_code_length: usize) -> Self {
        RequestValidator { max_code_length }
    }

    pub fn validate(&self, request: &Value) -> ValidationResult {
        let mut errors = Vec::new();

        let Some(obj) = request.as_object() else {
            errors.push("Request must be a valid object".to_string());
            return ValidationResult { is_valid: false, errors };
        };

        match obj.get("code").and_then(Value::as_str) {
            None => errors.push("Code is required and must be a string".to_string()),
            Some(code) if code.is_empty() => {
                errors.push("Code is required and must be a string".to_string());
            }
            Some(code) if code.chars().count() > self.max_code_length => {
                errors.push(format!(
                    "Code must be less than {} characters",
                    self.max_code_length
                ));
            }
            Some(_) => {}
        }

        if obj
            .get("language")
            .and_then(Value::as_str)
            .is_none_or_empty()
        {
            errors.push("Language is required and must be a string".to_string());
        }

        if obj
            .get("questionId")
            .and_then(Value::as_str)
            .is_none_or_empty()
        {
            errors.push("Question ID is required and must be a string".to_string());
        }

        if let Some(input) = obj.get("input") {
            if !input.is_string() {
                errors.push("Input must be a string if provided".to_string());
            }
        }

        let is_valid = errors.is_empty();

        if !is_valid {
            // Redacted shape summary only; submitted code never reaches logs.
            warn!(
                errors = ?errors,
                has_code = obj.contains_key("code"),
                code_is_string = obj.get("code").map(|v| v.is_string()).unwrap_or(false),
                code_length = obj.get("code").and_then(|v| v.as_str()).map(str::len),
                has_language = obj.contains_key("language"),
                language_is_string = obj.get("language").map(|v| v.is_string()).unwrap_or(false),
                has_question_id = obj.contains_key("questionId"),
                has_input = obj.contains_key("input"),
                "Request validation failed"
            );
        }

        ValidationResult { is_valid, errors }
    }
}

trait StrOptionExt {
    fn is_none_or_empty(&self) -> bool;
}

impl StrOptionExt for Option<&str> {
    fn is_none_or_empty(&self) -> bool {
        self.map(str::is_empty).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "code": "print('hi')",
            "language": "python",
            "questionId": "q-001",
        })
    }

    #[test]
    fn accepts_well_formed_request() {
        let validator = RequestValidator::default();
        let result = validator.validate(&valid_body());
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn accepts_optional_string_input() {
        let validator = RequestValidator::default();
        let mut body = valid_body();
        body["input"] = json!("1 2 3");
        assert!(validator.validate(&body).is_valid);
    }

    #[test]
    fn non_object_short_circuits_with_single_error() {
        let validator = RequestValidator::default();
        for body in [json!(null), json!("code"), json!(42), json!([1, 2])] {
            let result = validator.validate(&body);
            assert!(!result.is_valid);
            assert_eq!(result.errors, vec!["Request must be a valid object"]);
        }
    }

    #[test]
    fn missing_fields_accumulate() {
        let validator = RequestValidator::default();
        let result = validator.validate(&json!({}));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors.contains(&"Code is required and must be a string".to_string()));
        assert!(result.errors.contains(&"Language is required and must be a string".to_string()));
        assert!(result
            .errors
            .contains(&"Question ID is required and must be a string".to_string()));
    }

    #[test]
    fn wrong_types_are_rejected() {
        let validator = RequestValidator::default();
        let result = validator.validate(&json!({
            "code": 12,
            "language": ["python"],
            "questionId": true,
            "input": 5,
        }));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 4);
        assert!(result.errors.contains(&"Input must be a string if provided".to_string()));
    }

    #[test]
    fn oversized_code_gets_distinct_error() {
        let validator = RequestValidator::new(10);
        let mut body = valid_body();
        body["code"] = json!("x".repeat(11));
        let result = validator.validate(&body);
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Code must be less than 10 characters"]);
    }

    #[test]
    fn code_at_limit_is_accepted() {
        let validator = RequestValidator::new(10);
        let mut body = valid_body();
        body["code"] = json!("x".repeat(10));
        assert!(validator.validate(&body).is_valid);
    }

    #[test]
    fn unknown_language_value_passes_validation() {
        // Language value space is the registry's concern, not the validator's.
        let validator = RequestValidator::default();
        let mut body = valid_body();
        body["language"] = json!("made-up-language");
        assert!(validator.validate(&body).is_valid);
    }
}
