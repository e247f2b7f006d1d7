//! Error types for cellbench
//!
//! Every error here is recoverable at the session boundary. Messages say
//! what went wrong and, where it helps, what to do next.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// A single malformed line in a block of test data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// 1-based line number within the parsed blob
    pub line: usize,
    /// The offending line as written
    pub text: String,
    /// Parser message
    pub reason: String,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({:?})", self.line, self.reason, self.text)
    }
}

/// Main error type for cellbench
#[derive(Error, Debug)]
pub enum Error {
    // === Test data ===
    #[error("Malformed test data: {}", join_lines(.0))]
    TestData(Vec<LineError>),

    // === Session ===
    #[error("Session import rejected: {0}. The current session was left untouched")]
    ImportIntegrity(String),

    #[error("Saved session '{path}' is unreadable: {reason}. Delete or restore the file to start a fresh session")]
    SessionLoad { path: String, reason: String },

    #[error("Cell {id} not found (session has {count} cells)")]
    CellNotFound { id: usize, count: usize },

    #[error("Cannot remove cell: a session keeps at least {min} cells")]
    CellLimit { min: usize },

    #[error("Cell {0} has no committed settings. Commit the configuration before running")]
    PartialConfiguration(usize),

    // === Execution ===
    #[error("A job is already in flight. Wait for it to finish before submitting again")]
    JobInFlight,

    #[error("Execution failed: {0}")]
    Submission(String),

    #[error("Status poll failed: {0}")]
    Poll(String),

    #[error("Job was cancelled")]
    JobCancelled,

    // === Configuration ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal ===
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_lines(errors: &[LineError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create an import integrity error
    pub fn import_integrity(reason: impl Into<String>) -> Self {
        Self::ImportIntegrity(reason.into())
    }

    /// Create a submission error from an optional service message
    pub fn submission(message: Option<&str>) -> Self {
        match message.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) => Self::Submission(m.to_string()),
            None => Self::Submission("Unknown error".to_string()),
        }
    }

    /// Create a cell not found error
    pub fn cell_not_found(id: usize, count: usize) -> Self {
        Self::CellNotFound { id, count }
    }

    /// Line failures carried by a test data error, if any
    pub fn line_errors(&self) -> &[LineError] {
        match self {
            Self::TestData(lines) => lines,
            _ => &[],
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Submission(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_falls_back_to_generic_message() {
        assert_eq!(Error::submission(None).to_string(), "Execution failed: Unknown error");
        assert_eq!(Error::submission(Some("  ")).to_string(), "Execution failed: Unknown error");
        assert_eq!(
            Error::submission(Some("Timeout value needs to be at least 5 seconds")).to_string(),
            "Execution failed: Timeout value needs to be at least 5 seconds"
        );
    }

    #[test]
    fn test_test_data_lists_every_line() {
        let err = Error::TestData(vec![
            LineError { line: 2, text: "1,".into(), reason: "trailing comma".into() },
            LineError { line: 4, text: "x".into(), reason: "expected value".into() },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("line 2"));
        assert!(msg.contains("line 4"));
        assert_eq!(err.line_errors().len(), 2);
    }
}
