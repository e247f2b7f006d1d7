//! Test file ingestion
//!
//! A test file holds two sections introduced by header lines:
//!
//! ```text
//! input
//! 1, 2
//! 3, 6
//! output
//! 3
//! 9
//! ```
//!
//! Headers match case-insensitively after trimming.

use std::path::Path;

use crate::common::config::PreHeaderPolicy;
use crate::common::{Error, LineError, Result};

use super::literal::{parse_row, TestCase};

/// Parsed contents of a test file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFile {
    pub input: Vec<TestCase>,
    pub output: Vec<TestCase>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Input,
    Output,
}

fn header(line: &str) -> Option<Section> {
    if line.eq_ignore_ascii_case("input") {
        Some(Section::Input)
    } else if line.eq_ignore_ascii_case("output") {
        Some(Section::Output)
    } else {
        None
    }
}

/// Parse test file text into input and output rows
pub fn parse_test_file(text: &str, policy: PreHeaderPolicy) -> Result<TestFile> {
    let mut parsed = TestFile::default();
    let mut failures = Vec::new();
    let mut section = None;
    let mut dropped = 0usize;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if let Some(next) = header(line) {
            section = Some(next);
            continue;
        }
        if line.is_empty() {
            continue;
        }

        let Some(active) = section else {
            match policy {
                PreHeaderPolicy::Drop => dropped += 1,
                PreHeaderPolicy::Reject => failures.push(LineError {
                    line: idx + 1,
                    text: raw.to_string(),
                    reason: "data before any 'input' or 'output' header".to_string(),
                }),
            }
            continue;
        };

        match parse_row(line) {
            Ok(row) if row.is_empty() => {}
            Ok(row) => match active {
                Section::Input => parsed.input.push(row),
                Section::Output => parsed.output.push(row),
            },
            Err(reason) => failures.push(LineError {
                line: idx + 1,
                text: raw.to_string(),
                reason,
            }),
        }
    }

    if dropped > 0 {
        tracing::warn!(lines = dropped, "Ignored test file lines before the first section header");
    }

    if !failures.is_empty() {
        return Err(Error::TestData(failures));
    }

    tracing::debug!(
        inputs = parsed.input.len(),
        outputs = parsed.output.len(),
        "Parsed test file"
    );
    Ok(parsed)
}

/// Read and parse a test file from disk
pub fn load_test_file(path: &Path, policy: PreHeaderPolicy) -> Result<TestFile> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    parse_test_file(&text, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Input\n1, 2\n3, 6\n\nOUTPUT\n3\n9\n";

    #[test]
    fn test_sections_are_split() {
        let file = parse_test_file(SAMPLE, PreHeaderPolicy::Drop).unwrap();
        assert_eq!(file.input, vec![vec!["1", "2"], vec!["3", "6"]]);
        assert_eq!(file.output, vec![vec!["3"], vec!["9"]]);
    }

    #[test]
    fn test_sections_can_repeat() {
        let file = parse_test_file("input\n1\noutput\n2\ninput\n3\n", PreHeaderPolicy::Drop).unwrap();
        assert_eq!(file.input, vec![vec!["1"], vec!["3"]]);
        assert_eq!(file.output, vec![vec!["2"]]);
    }

    #[test]
    fn test_pre_header_lines_dropped() {
        let file = parse_test_file("7, 8\ninput\n1\n", PreHeaderPolicy::Drop).unwrap();
        assert_eq!(file.input, vec![vec!["1"]]);
        assert!(file.output.is_empty());
    }

    #[test]
    fn test_pre_header_lines_rejected() {
        let err = parse_test_file("7, 8\ninput\n1\n", PreHeaderPolicy::Reject).unwrap_err();
        assert_eq!(err.line_errors()[0].line, 1);
    }

    #[test]
    fn test_all_bad_lines_reported() {
        let err = parse_test_file("input\n1,\n2\noutput\n[\n", PreHeaderPolicy::Drop).unwrap_err();
        let lines: Vec<usize> = err.line_errors().iter().map(|l| l.line).collect();
        assert_eq!(lines, vec![2, 5]);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.txt");
        std::fs::write(&path, SAMPLE).unwrap();
        let file = load_test_file(&path, PreHeaderPolicy::Drop).unwrap();
        assert_eq!(file.input.len(), 2);
    }
}
