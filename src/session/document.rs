//! Session document
//!
//! Flat JSON object used for export/import and for the on-disk session:
//!
//! ```text
//! {
//!   "format_version": 1,
//!   "final_config": { ... },
//!   "cells": [ { "code", "language", "version", "compiler" }, ... ],
//!   "cell.0.code": "...", "cell.0.language": "...", ...
//!   "last_result": { ... } | null,
//!   "display": { ... }
//! }
//! ```
//!
//! The on-disk copy additionally carries `draft_config`; exports never do.
//! Decoding validates the whole document before producing a session.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::{paths, Error, Result};
use crate::exec::protocol::ExecutionResult;

use super::model::{Cell, DisplayConfig, Session, SessionConfig};

/// Current document layout
pub const FORMAT_VERSION: u64 = 1;

const FORMAT_VERSION_KEY: &str = "format_version";
const FINAL_KEY: &str = "final_config";
const DRAFT_KEY: &str = "draft_config";
const CELLS_KEY: &str = "cells";
const LAST_RESULT_KEY: &str = "last_result";
const DISPLAY_KEY: &str = "display";
const CELL_PREFIX: &str = "cell.";
const CELL_FIELDS: [&str; 4] = ["code", "language", "version", "compiler"];

/// Serialized session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDocument {
    entries: Map<String, Value>,
}

impl SessionDocument {
    /// Exportable view of a session (no draft)
    pub fn export(session: &Session) -> Result<Self> {
        let mut entries = Map::new();
        entries.insert(FORMAT_VERSION_KEY.to_string(), Value::from(FORMAT_VERSION));
        entries.insert(FINAL_KEY.to_string(), serde_json::to_value(&session.committed)?);
        entries.insert(CELLS_KEY.to_string(), serde_json::to_value(&session.cells)?);
        for (i, cell) in session.cells.iter().enumerate() {
            for field in CELL_FIELDS {
                entries.insert(cell_key(i, field), Value::from(cell_field(cell, field)));
            }
        }
        entries.insert(LAST_RESULT_KEY.to_string(), serde_json::to_value(&session.last_result)?);
        entries.insert(DISPLAY_KEY.to_string(), serde_json::to_value(session.display)?);
        Ok(Self { entries })
    }

    /// Full session including the draft, for local persistence
    pub fn snapshot(session: &Session) -> Result<Self> {
        let mut doc = Self::export(session)?;
        doc.entries
            .insert(DRAFT_KEY.to_string(), serde_json::to_value(&session.draft)?);
        Ok(doc)
    }

    /// Decode as an import: the draft becomes a copy of the final config
    pub fn into_session(mut self) -> Result<Session> {
        self.entries.remove(DRAFT_KEY);
        self.decode()
    }

    /// Decode a persisted snapshot, keeping its draft when present
    pub fn restore(self) -> Result<Session> {
        self.decode()
    }

    /// Parse document text; malformed JSON is an integrity failure
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::import_integrity(format!("not a session document: {}", e)))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    #[cfg(test)]
    pub(crate) fn entries_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.entries
    }

    fn decode(self) -> Result<Session> {
        let mut entries = self.entries;

        let version = take_required(&mut entries, FORMAT_VERSION_KEY)?;
        match version.as_u64() {
            Some(v) if (1..=FORMAT_VERSION).contains(&v) => {}
            _ => {
                return Err(Error::import_integrity(format!(
                    "unsupported format_version {} (expected 1..={})",
                    version, FORMAT_VERSION
                )))
            }
        }

        let committed: SessionConfig = take_schema(&mut entries, FINAL_KEY)?;
        let cells: Vec<Cell> = take_schema(&mut entries, CELLS_KEY)?;
        let last_result: Option<ExecutionResult> = take_schema(&mut entries, LAST_RESULT_KEY)?;
        let display: DisplayConfig = take_schema(&mut entries, DISPLAY_KEY)?;
        let draft: Option<SessionConfig> = match entries.remove(DRAFT_KEY) {
            Some(value) => Some(schema(DRAFT_KEY, value)?),
            None => None,
        };

        if cells.is_empty() {
            return Err(Error::import_integrity("document has no cells"));
        }
        if committed.cells.len() != cells.len() {
            return Err(Error::import_integrity(format!(
                "final_config lists {} cells but the document has {}",
                committed.cells.len(),
                cells.len()
            )));
        }

        for (i, cell) in cells.iter().enumerate() {
            for field in CELL_FIELDS {
                let key = cell_key(i, field);
                let value = take_required(&mut entries, &key)?;
                let Some(text) = value.as_str() else {
                    return Err(Error::import_integrity(format!("{} must be a string", key)));
                };
                if text != cell_field(cell, field) {
                    return Err(Error::import_integrity(format!(
                        "{} disagrees with cells[{}]",
                        key, i
                    )));
                }
            }
        }

        for key in entries.keys() {
            if key.starts_with(CELL_PREFIX) {
                return Err(Error::import_integrity(format!(
                    "unexpected key {} for a session of {} cells",
                    key,
                    cells.len()
                )));
            }
            tracing::debug!(key = %key, "Ignoring unknown session document key");
        }

        Ok(Session {
            draft: draft.unwrap_or_else(|| committed.clone()),
            cells,
            committed,
            last_result,
            display,
        })
    }
}

/// Read a session document from disk
pub fn read_document(path: &Path) -> Result<SessionDocument> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    SessionDocument::from_json(&text)
}

/// Write a session document to disk
pub fn write_document(path: &Path, doc: &SessionDocument) -> Result<()> {
    paths::ensure_parent_dir(path)?;
    std::fs::write(path, doc.to_json_pretty()?)?;
    Ok(())
}

fn cell_key(index: usize, field: &str) -> String {
    format!("{}{}.{}", CELL_PREFIX, index, field)
}

fn cell_field<'a>(cell: &'a Cell, field: &str) -> &'a str {
    match field {
        "code" => &cell.code,
        "language" => &cell.language,
        "version" => &cell.version,
        _ => &cell.compiler,
    }
}

fn take_required(entries: &mut Map<String, Value>, key: &str) -> Result<Value> {
    entries
        .remove(key)
        .ok_or_else(|| Error::import_integrity(format!("missing required key {}", key)))
}

fn take_schema<T: DeserializeOwned>(entries: &mut Map<String, Value>, key: &str) -> Result<T> {
    let value = take_required(entries, key)?;
    schema(key, value)
}

fn schema<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::import_integrity(format!("{}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use crate::exec::protocol::CellOutcome;
    use serde_json::json;

    fn sample() -> Session {
        let mut session = Session::new(2);
        session.cells[0].code = "def f(a): return a".into();
        session.cells[0].language = "python".into();
        session.cells[0].version = "3.10".into();
        session.committed.cells[1].name = "g".into();
        session.draft.timeout = 5;
        let mut result = ExecutionResult::default();
        result.cells.insert(0, CellOutcome { value: "1".into(), ..Default::default() });
        session.last_result = Some(result);
        session
    }

    #[test]
    fn test_export_has_flat_cell_keys_and_no_draft() {
        let doc = SessionDocument::export(&sample()).unwrap();
        assert_eq!(doc.get("cell.0.language"), Some(&json!("python")));
        assert_eq!(doc.get("cell.1.code"), Some(&json!("")));
        assert!(doc.get("draft_config").is_none());
        assert!(doc.get("cell.2.code").is_none());
    }

    #[test]
    fn test_import_sets_draft_to_final() {
        let session = sample();
        let restored = SessionDocument::export(&session).unwrap().into_session().unwrap();
        assert_eq!(restored.draft, session.committed);
        assert_eq!(restored.cells, session.cells);
        assert_eq!(restored.last_result, session.last_result);
    }

    #[test]
    fn test_snapshot_keeps_draft() {
        let session = sample();
        let restored = SessionDocument::snapshot(&session).unwrap().restore().unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_rejects_missing_key() {
        let mut doc = SessionDocument::export(&sample()).unwrap();
        doc.entries_mut().remove("display");
        assert!(matches!(doc.into_session(), Err(Error::ImportIntegrity(_))));
    }

    #[test]
    fn test_rejects_inconsistent_cell_keys() {
        let mut doc = SessionDocument::export(&sample()).unwrap();
        doc.entries_mut().insert("cell.5.code".into(), json!("x"));
        assert!(doc.clone().into_session().is_err());

        let mut doc = SessionDocument::export(&sample()).unwrap();
        doc.entries_mut().insert("cell.0.code".into(), json!("changed"));
        assert!(doc.into_session().is_err());
    }

    #[test]
    fn test_rejects_final_cell_count_mismatch() {
        let mut session = sample();
        session.committed.cells.pop();
        let doc = SessionDocument::export(&session).unwrap();
        let err = doc.into_session().unwrap_err();
        assert!(err.to_string().contains("final_config lists 1 cells"));
    }

    #[test]
    fn test_rejects_garbage_text() {
        assert!(matches!(
            SessionDocument::from_json("[1, 2]"),
            Err(Error::ImportIntegrity(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let doc = SessionDocument::export(&sample()).unwrap();
        write_document(&path, &doc).unwrap();
        assert_eq!(read_document(&path).unwrap(), doc);
    }
}
