//! Result reconciliation
//!
//! Joins a batch result with the session's cells and display preferences
//! into a view ready to print. Differential counts are passed through as
//! the service reported them; [`DifferentialView::is_consistent`] lets the
//! caller check them without anything being repaired here.

use serde_json::Value;

use crate::exec::protocol::{
    display_value, CellOutcome, Differential, ExecutionResult, FailedCase, FailedCell,
    EXPECTED_OUTPUT_KEY,
};
use crate::session::{CellId, DisplayConfig, Session};

/// Everything needed to present one run
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    /// One entry per session cell, in id order
    pub cells: Vec<CellView>,
    pub differential: Option<DifferentialView>,
    pub display: DisplayConfig,
}

/// A cell and its output, if it took part in the run
#[derive(Debug, Clone, PartialEq)]
pub struct CellView {
    pub id: CellId,
    pub language: String,
    pub output: Option<CellOutput>,
}

/// Output of one cell with display preferences applied
#[derive(Debug, Clone, PartialEq)]
pub struct CellOutput {
    pub value: String,
    pub error: Option<String>,
    /// `None` when hidden
    pub execution_time: Option<String>,
    /// `None` when hidden
    pub memory_usage: Option<String>,
    /// Raw per-test output in service order; `None` when hidden
    pub terminal: Option<Vec<(String, String)>>,
}

/// Differential summary as reported
#[derive(Debug, Clone, PartialEq)]
pub struct DifferentialView {
    pub test_count: u64,
    pub matched: u64,
    pub no_match: u64,
    pub failed: Vec<FailedCaseView>,
}

impl DifferentialView {
    /// Whether the failed list agrees with the reported mismatch count
    pub fn is_consistent(&self) -> bool {
        self.failed.len() as u64 == self.no_match
    }
}

/// One disagreeing input
#[derive(Debug, Clone, PartialEq)]
pub struct FailedCaseView {
    pub input: String,
    pub expected: Option<String>,
    /// Per-cell results in the order the service listed them
    pub entries: Vec<FailedEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedEntry {
    /// Key as the service sent it
    pub key: String,
    /// Parsed cell id, when the key is numeric
    pub cell: Option<CellId>,
    pub value: String,
    pub error: Option<String>,
}

/// Build the view for `result` against the session's cells
pub fn reconcile(result: &ExecutionResult, session: &Session) -> SessionView {
    let display = session.display;

    let cells = session
        .cells
        .iter()
        .enumerate()
        .map(|(i, cell)| CellView {
            id: CellId(i),
            language: cell.language.clone(),
            output: result.cells.get(&i).map(|outcome| cell_output(outcome, &display)),
        })
        .collect();

    let strays = result.cells.keys().filter(|id| **id >= session.cell_count()).count();
    if strays > 0 {
        tracing::debug!(strays, cells = session.cell_count(), "Result has entries for unknown cells");
    }

    let differential = result.differential.as_ref().map(differential_view);
    if let Some(diff) = &differential {
        if !diff.is_consistent() {
            tracing::warn!(
                failed = diff.failed.len(),
                no_match = diff.no_match,
                "Differential failed list does not match its no_match count"
            );
        }
    }

    SessionView {
        cells,
        differential,
        display,
    }
}

/// View of the session's last recorded result, if any
pub fn reconcile_last(session: &Session) -> Option<SessionView> {
    session
        .last_result
        .as_ref()
        .map(|result| reconcile(result, session))
}

fn cell_output(outcome: &CellOutcome, display: &DisplayConfig) -> CellOutput {
    CellOutput {
        value: outcome.value.clone(),
        error: non_empty(&outcome.error_msg),
        execution_time: display
            .show_time_metric
            .then(|| outcome.metrics.execution_time.clone()),
        memory_usage: display
            .show_memory_metric
            .then(|| outcome.metrics.memory_usage.clone()),
        terminal: display.show_terminal.then(|| {
            outcome
                .outputs
                .iter()
                .map(|(key, value)| (key.clone(), display_value(value)))
                .collect()
        }),
    }
}

fn differential_view(diff: &Differential) -> DifferentialView {
    DifferentialView {
        test_count: diff.test_count,
        matched: diff.matched,
        no_match: diff.no_match,
        failed: diff.failed.iter().map(failed_case_view).collect(),
    }
}

fn failed_case_view(case: &FailedCase) -> FailedCaseView {
    let expected = case
        .cells
        .get(EXPECTED_OUTPUT_KEY)
        .map(|v| display_value(v.get("value").unwrap_or(v)));

    let entries = case
        .cells
        .iter()
        .filter(|(key, _)| key.as_str() != EXPECTED_OUTPUT_KEY)
        .map(|(key, value)| {
            let cell = parse_failed_cell(value);
            FailedEntry {
                key: key.clone(),
                cell: key.parse::<usize>().ok().map(CellId),
                value: cell.value,
                error: non_empty(&cell.error_msg),
            }
        })
        .collect();

    FailedCaseView {
        input: display_value(&case.input),
        expected,
        entries,
    }
}

fn parse_failed_cell(value: &Value) -> FailedCell {
    match value {
        Value::Object(_) => serde_json::from_value(value.clone()).unwrap_or_default(),
        other => FailedCell {
            value: display_value(other),
            error_msg: String::new(),
        },
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.trim().is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result() -> ExecutionResult {
        serde_json::from_value(json!({
            "1": {
                "value": "[3, 9]", "error_msg": "",
                "defaultMetrics": { "executionTime": "0:00.02", "memoryUsage": "9800 KB" },
                "outputs": { "1": "3", "2": "9" }
            },
            "0": { "value": "", "error_msg": "SyntaxError", "defaultMetrics": {} },
            "differential": {
                "test_count": 5, "matched": 3, "no_match": 2,
                "failed": [{
                    "input": "1, 2",
                    "cells": {
                        "1": { "value": "3", "error_msg": "" },
                        "0": { "value": "", "error_msg": "SyntaxError" },
                        "expected_output": { "value": "3" }
                    }
                }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_cells_merged_by_id() {
        let session = Session::new(3);
        let view = reconcile(&result(), &session);
        assert_eq!(view.cells.len(), 3);
        assert_eq!(view.cells[0].output.as_ref().unwrap().error.as_deref(), Some("SyntaxError"));
        let one = view.cells[1].output.as_ref().unwrap();
        assert_eq!(one.value, "[3, 9]");
        assert_eq!(one.error, None);
        assert_eq!(one.memory_usage.as_deref(), Some("9800 KB"));
        assert_eq!(one.terminal.as_ref().unwrap()[1], ("2".to_string(), "9".to_string()));
        assert!(view.cells[2].output.is_none());
    }

    #[test]
    fn test_display_preferences_apply_to_every_cell() {
        let mut session = Session::new(2);
        session.display = DisplayConfig {
            show_time_metric: false,
            show_memory_metric: true,
            show_terminal: false,
        };
        let view = reconcile(&result(), &session);
        for cell in view.cells.iter().filter_map(|c| c.output.as_ref()) {
            assert!(cell.execution_time.is_none());
            assert!(cell.memory_usage.is_some());
            assert!(cell.terminal.is_none());
        }
    }

    #[test]
    fn test_differential_passes_counts_and_order_through() {
        let view = reconcile(&result(), &Session::new(2));
        let diff = view.differential.unwrap();
        assert_eq!((diff.test_count, diff.matched, diff.no_match), (5, 3, 2));
        assert_eq!(diff.failed.len(), 1);
        assert!(!diff.is_consistent());

        let case = &diff.failed[0];
        assert_eq!(case.input, "1, 2");
        assert_eq!(case.expected.as_deref(), Some("3"));
        let keys: Vec<&str> = case.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["1", "0"]);
        assert_eq!(case.entries[1].cell, Some(CellId(0)));
        assert_eq!(case.entries[1].error.as_deref(), Some("SyntaxError"));
    }

    #[test]
    fn test_reconcile_last_without_result() {
        assert!(reconcile_last(&Session::default()).is_none());
    }
}
