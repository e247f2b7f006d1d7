//! Execution service wire types
//!
//! Request and response shapes of the batch execution service. Field names
//! follow the service's JSON exactly; Rust-side names are snake_case.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::testspec::TestCase;

/// Batch submission body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub message: RequestMessage,
}

/// Everything the service needs to run one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    /// One entry per cell taking part in the batch
    pub options: Vec<CellOption>,
    pub input: Vec<TestCase>,
    pub output: Vec<TestCase>,
    /// Seconds
    pub timeout: u64,
    pub generate_test_cases: bool,
    pub test_cases_signature: String,
    pub test_cases_count: u32,
}

/// One cell as the service sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellOption {
    pub cell_id: usize,
    pub code: String,
    pub signature: OptionSignature,
    pub language: String,
    pub version: String,
    pub compiler: String,
    pub specs: String,
    pub run_as_is: bool,
}

/// Function signature the service wraps cell code with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSignature {
    pub name: String,
    pub args: String,
    #[serde(rename = "return")]
    pub return_type: String,
}

/// Progress report from the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: f64,
}

/// Error body of a non-success response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<ErrorMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorMessage {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ErrorResponse {
    /// Service-supplied message, if the body carried one
    pub fn error_message(&self) -> Option<&str> {
        self.message.as_ref()?.error_message.as_deref()
    }
}

/// Reserved top-level key holding the differential summary
pub const DIFFERENTIAL_KEY: &str = "differential";

/// Reserved per-case key holding the declared expected value
pub const EXPECTED_OUTPUT_KEY: &str = "expected_output";

/// Successful batch result
///
/// The service answers with a flat object: one key per cell id, an optional
/// `differential` summary, and possibly other keys (such as the simulated
/// `expected_output` cell), which are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ExecutionResult {
    pub cells: BTreeMap<usize, CellOutcome>,
    pub differential: Option<Differential>,
    pub extra: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for ExecutionResult {
    type Error = serde_json::Error;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut result = ExecutionResult::default();
        for (key, value) in map {
            if key == DIFFERENTIAL_KEY {
                if !value.is_null() {
                    result.differential = Some(serde_json::from_value(value)?);
                }
            } else if let Ok(id) = key.parse::<usize>() {
                result.cells.insert(id, serde_json::from_value(value)?);
            } else {
                result.extra.insert(key, value);
            }
        }
        Ok(result)
    }
}

impl From<ExecutionResult> for Map<String, Value> {
    fn from(result: ExecutionResult) -> Self {
        let mut map = Map::new();
        for (id, outcome) in result.cells {
            // CellOutcome only holds strings and JSON values
            let value = serde_json::to_value(outcome).unwrap_or(Value::Null);
            map.insert(id.to_string(), value);
        }
        for (key, value) in result.extra {
            map.insert(key, value);
        }
        if let Some(diff) = result.differential {
            let value = serde_json::to_value(diff).unwrap_or(Value::Null);
            map.insert(DIFFERENTIAL_KEY.to_string(), value);
        }
        map
    }
}

/// Output of one cell over the whole batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellOutcome {
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_msg: String,
    #[serde(default, rename = "defaultMetrics")]
    pub metrics: Metrics,
    /// Per-test raw outputs keyed as the service keyed them
    #[serde(default)]
    pub outputs: Map<String, Value>,
}

/// Resource usage as preformatted by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default, rename = "executionTime", deserialize_with = "lenient_string")]
    pub execution_time: String,
    #[serde(default, rename = "memoryUsage", deserialize_with = "lenient_string")]
    pub memory_usage: String,
}

/// Cross-cell comparison summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Differential {
    #[serde(default)]
    pub test_count: u64,
    #[serde(default)]
    pub matched: u64,
    #[serde(default)]
    pub no_match: u64,
    #[serde(default)]
    pub failed: Vec<FailedCase>,
}

/// One test input on which the cells disagreed
///
/// `cells` keeps the service's key order, which is significant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailedCase {
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub cells: Map<String, Value>,
}

/// Value/error pair inside a failed case
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FailedCell {
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_msg: String,
}

/// Accept strings, null and scalars where the service promises a string
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Render a JSON value the way it is shown to the user
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_uses_service_field_names() {
        let request = ExecutionRequest {
            message: RequestMessage {
                options: vec![CellOption {
                    cell_id: 0,
                    code: "def f(a): return a".into(),
                    signature: OptionSignature {
                        name: "f".into(),
                        args: "int".into(),
                        return_type: "int".into(),
                    },
                    language: "python".into(),
                    version: "3.10".into(),
                    compiler: String::new(),
                    specs: String::new(),
                    run_as_is: false,
                }],
                input: vec![vec!["1".into()]],
                output: vec![vec!["1".into()]],
                timeout: 60,
                generate_test_cases: false,
                test_cases_signature: "int".into(),
                test_cases_count: 25,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message"]["options"][0]["signature"]["return"], "int");
        assert_eq!(value["message"]["options"][0]["run_as_is"], false);
        assert_eq!(value["message"]["test_cases_count"], 25);
    }

    #[test]
    fn test_result_splits_cells_differential_and_extra() {
        let result: ExecutionResult = serde_json::from_value(json!({
            "0": { "value": "3", "error_msg": "", "defaultMetrics": { "executionTime": "0:00.01", "memoryUsage": "9000 KB" }, "outputs": {} },
            "1": { "value": null, "error_msg": "boom" },
            "expected_output": { "value": "3" },
            "differential": { "test_count": 1, "matched": 0, "no_match": 1, "failed": [] }
        }))
        .unwrap();
        assert_eq!(result.cells.len(), 2);
        assert_eq!(result.cells[&0].metrics.memory_usage, "9000 KB");
        assert_eq!(result.cells[&1].value, "");
        assert_eq!(result.cells[&1].error_msg, "boom");
        assert!(result.extra.contains_key(EXPECTED_OUTPUT_KEY));
        assert_eq!(result.differential.as_ref().unwrap().no_match, 1);
    }

    #[test]
    fn test_failed_case_keeps_service_order() {
        let case: FailedCase = serde_json::from_str(
            r#"{ "input": "1, 2", "cells": { "2": {"value": "a"}, "0": {"value": "b"}, "expected_output": {"value": "c"} } }"#,
        )
        .unwrap();
        let keys: Vec<&str> = case.cells.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["2", "0", "expected_output"]);
    }

    #[test]
    fn test_error_message_extraction() {
        let body: ErrorResponse = serde_json::from_value(json!({
            "message": { "status": 400, "error_message": "Options list cannot be empty." }
        }))
        .unwrap();
        assert_eq!(body.error_message(), Some("Options list cannot be empty."));
        let empty: ErrorResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.error_message(), None);
    }
}
