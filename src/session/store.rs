//! Session store
//!
//! Owns the session and its repository. Every mutation is applied to a
//! copy, persisted, and only then swapped in, so a failed edit or a failed
//! save leaves both memory and storage as they were.

use std::path::Path;

use crate::common::config::SessionSettings;
use crate::common::{Error, Result};
use crate::exec::protocol::ExecutionResult;
use crate::testspec::{self, TestCase, TestFile};

use super::document::SessionDocument;
use super::languages::{LanguageCatalog, LanguageProfile};
use super::model::{Cell, CellId, CellSignature, DisplayConfig, Remap, Session, SessionConfig};
use super::repository::SessionRepository;

/// Authoritative session state behind a repository
pub struct SessionStore<R: SessionRepository> {
    session: Session,
    repo: R,
    settings: SessionSettings,
    catalog: LanguageCatalog,
}

impl<R: SessionRepository> SessionStore<R> {
    /// Load the saved session, or start a fresh one
    pub fn open(repo: R, settings: SessionSettings, catalog: LanguageCatalog) -> Result<Self> {
        let session = match repo.load()? {
            Some(session) => session,
            None => {
                let n = settings.initial_cells.max(settings.min_cells).max(1);
                tracing::debug!(cells = n, "Starting a new session");
                Session::new(n)
            }
        };
        Ok(Self {
            session,
            repo,
            settings,
            catalog,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut LanguageCatalog {
        &mut self.catalog
    }

    // === Draft / Final ===

    pub fn draft(&self) -> &SessionConfig {
        &self.session.draft
    }

    /// Edit the draft; the committed config is not touched
    pub fn update_draft<F>(&mut self, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut SessionConfig),
    {
        self.mutate(|session| {
            mutator(&mut session.draft);
            Ok(())
        })
    }

    pub fn committed(&self) -> &SessionConfig {
        &self.session.committed
    }

    /// Copy the draft into the committed config
    pub fn commit(&mut self) -> Result<()> {
        self.mutate(|session| {
            session.committed = session.draft.clone();
            Ok(())
        })?;
        tracing::info!(cells = self.session.committed.cells.len(), "Committed configuration");
        Ok(())
    }

    /// Parse both test blobs and, only if both parse, store and commit them
    pub fn commit_tests(&mut self, raw_input: &str, raw_output: &str) -> Result<()> {
        let input = testspec::parse_field(raw_input);
        let output = testspec::parse_field(raw_output);
        let (input, output) = match (input, output) {
            (Ok(i), Ok(o)) => (i, o),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
            (Err(a), Err(b)) => {
                let mut lines = a.line_errors().to_vec();
                lines.extend_from_slice(b.line_errors());
                return Err(Error::TestData(lines));
            }
        };
        if input.len() != output.len() {
            tracing::warn!(
                inputs = input.len(),
                outputs = output.len(),
                "Input and output row counts differ"
            );
        }

        self.mutate(|session| {
            let tests = &mut session.draft.tests;
            tests.raw_input = raw_input.to_string();
            tests.raw_output = raw_output.to_string();
            tests.input = input;
            tests.output = output;
            session.committed = session.draft.clone();
            Ok(())
        })
    }

    /// Load test rows from test file text into both draft and committed
    pub fn import_test_file(&mut self, text: &str) -> Result<()> {
        let file = testspec::parse_test_file(text, self.settings.pre_header_lines)?;
        self.apply_test_file(file)
    }

    /// Read a test file from disk and import it like [`Self::import_test_file`]
    pub fn load_test_file(&mut self, path: &Path) -> Result<()> {
        let file = testspec::load_test_file(path, self.settings.pre_header_lines)?;
        self.apply_test_file(file)
    }

    fn apply_test_file(&mut self, file: TestFile) -> Result<()> {
        let raw_input = render_rows(&file.input);
        let raw_output = render_rows(&file.output);
        self.mutate(|session| {
            for config in [&mut session.draft, &mut session.committed] {
                config.tests.input = file.input.clone();
                config.tests.output = file.output.clone();
                config.tests.raw_input = raw_input.clone();
                config.tests.raw_output = raw_output.clone();
            }
            Ok(())
        })?;
        tracing::info!(
            inputs = file.input.len(),
            outputs = file.output.len(),
            "Imported test file"
        );
        Ok(())
    }

    // === Cells ===

    /// Append an empty cell; returns its id
    pub fn add_cell(&mut self) -> Result<CellId> {
        let id = self.mutate(|session| {
            session.cells.push(Cell::default());
            session.draft.cells.push(CellSignature::default());
            session.committed.cells.push(CellSignature::default());
            Ok(CellId(session.cells.len() - 1))
        })?;
        tracing::info!(cell_id = %id, "Added cell");
        Ok(id)
    }

    /// Remove a cell and shift every later cell down by one
    pub fn remove_cell(&mut self, id: CellId) -> Result<()> {
        let count = self.session.cell_count();
        if id.index() >= count {
            return Err(Error::cell_not_found(id.index(), count));
        }
        let min = self.settings.min_cells.max(1);
        if count <= min {
            return Err(Error::CellLimit { min });
        }

        let remap = Remap::removing(id);
        self.mutate(|session| {
            session.apply_remap(&remap);
            Ok(())
        })?;
        tracing::info!(cell_id = %id, cells = self.session.cell_count(), "Removed cell");
        Ok(())
    }

    pub fn set_code(&mut self, id: CellId, code: impl Into<String>) -> Result<()> {
        let code = code.into();
        self.edit_cell(id, |cell| cell.code = code)
    }

    /// Change a cell's language, filling in profile defaults where unset
    pub fn set_language(&mut self, id: CellId, language: &str) -> Result<()> {
        let profile = self.catalog.get(language).cloned();
        if profile.is_none() {
            tracing::warn!(language, "Language has no known profile");
        }
        self.edit_cell(id, |cell| apply_language(cell, language, profile.as_ref()))
    }

    pub fn set_version(&mut self, id: CellId, version: impl Into<String>) -> Result<()> {
        let version = version.into();
        self.edit_cell(id, |cell| cell.version = version)
    }

    pub fn set_compiler(&mut self, id: CellId, compiler: impl Into<String>) -> Result<()> {
        let compiler = compiler.into();
        self.edit_cell(id, |cell| cell.compiler = compiler)
    }

    /// Load a cell's code from a file, inferring the language from its extension
    pub fn load_code_file(&mut self, id: CellId, path: &Path) -> Result<()> {
        self.check_cell(id)?;
        let code = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let profile = self.catalog.for_path(path).cloned();
        if profile.is_none() {
            tracing::warn!(path = %path.display(), "Could not infer a language from the file name");
        }

        // Code and language land in one save
        self.edit_cell(id, |cell| {
            cell.code = code;
            if let Some(profile) = &profile {
                apply_language(cell, &profile.id, Some(profile));
            }
        })
    }

    // === Display / results ===

    pub fn set_display(&mut self, display: DisplayConfig) -> Result<()> {
        self.mutate(|session| {
            session.display = display;
            Ok(())
        })
    }

    /// Replace the last result wholesale
    pub fn record_result(&mut self, result: ExecutionResult) -> Result<()> {
        self.mutate(|session| {
            session.last_result = Some(result);
            Ok(())
        })
    }

    // === Export / import ===

    pub fn export_session(&self) -> Result<SessionDocument> {
        SessionDocument::export(&self.session)
    }

    /// Replace the whole session with a validated document
    pub fn import_session(&mut self, doc: SessionDocument) -> Result<()> {
        let imported = doc.into_session()?;
        let cells = imported.cell_count();
        self.repo.save(&imported)?;
        self.session = imported;
        tracing::info!(cells, "Imported session");
        Ok(())
    }

    fn check_cell(&self, id: CellId) -> Result<()> {
        let count = self.session.cell_count();
        if id.index() >= count {
            return Err(Error::cell_not_found(id.index(), count));
        }
        Ok(())
    }

    fn edit_cell<F>(&mut self, id: CellId, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Cell),
    {
        self.check_cell(id)?;
        self.mutate(|session| {
            let count = session.cell_count();
            let cell = session
                .cells
                .get_mut(id.index())
                .ok_or_else(|| Error::cell_not_found(id.index(), count))?;
            edit(cell);
            Ok(())
        })
    }

    fn mutate<T, F>(&mut self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let mut next = self.session.clone();
        let out = change(&mut next)?;
        self.repo.save(&next)?;
        self.session = next;
        Ok(out)
    }
}

/// Set a cell's language, filling in profile defaults where unset
fn apply_language(cell: &mut Cell, language: &str, profile: Option<&LanguageProfile>) {
    cell.language = language.to_string();
    if let Some(profile) = profile {
        if cell.version.is_empty() {
            cell.version = profile.default_version.clone().unwrap_or_default();
        }
        if cell.compiler.is_empty() {
            cell.compiler = profile.default_compiler.clone().unwrap_or_default();
        }
    }
}

/// Canonical raw text for parsed rows
fn render_rows(rows: &[TestCase]) -> String {
    rows.iter()
        .map(|row| row.join(", "))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::repository::MemoryRepository;

    fn store() -> SessionStore<MemoryRepository> {
        SessionStore::open(
            MemoryRepository::new(),
            SessionSettings::default(),
            LanguageCatalog::builtin(),
        )
        .unwrap()
    }

    #[test]
    fn test_open_fresh_session() {
        let store = store();
        assert_eq!(store.session().cell_count(), 2);
        assert_eq!(store.repository().saves(), 0);
    }

    #[test]
    fn test_draft_edits_do_not_touch_final() {
        let mut store = store();
        store.update_draft(|d| d.timeout = 5).unwrap();
        assert_eq!(store.draft().timeout, 5);
        assert_eq!(store.committed().timeout, 60);
        store.commit().unwrap();
        assert_eq!(store.committed().timeout, 5);
    }

    #[test]
    fn test_commit_tests_all_or_nothing() {
        let mut store = store();
        let err = store.commit_tests("1, 2\n3,", "3\n[").unwrap_err();
        assert_eq!(err.line_errors().len(), 2);
        assert!(store.committed().tests.input.is_empty());

        store.commit_tests("1, 2\n3, 6", "3\n9").unwrap();
        assert_eq!(store.committed().tests.input, vec![vec!["1", "2"], vec!["3", "6"]]);
        assert_eq!(store.draft().tests.raw_output, "3\n9");
    }

    #[test]
    fn test_import_test_file_sets_both_configs() {
        let mut store = store();
        store.import_test_file("input\n[1,2], 3\noutput\n6\n").unwrap();
        assert_eq!(store.draft().tests.input, vec![vec!["[1, 2]", "3"]]);
        assert_eq!(store.committed().tests.output, vec![vec!["6"]]);
        assert_eq!(store.committed().tests.raw_input, "[1, 2], 3");
    }

    #[test]
    fn test_load_test_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.txt");
        std::fs::write(&path, "INPUT\n1, 2\n3, 6\nOutput\n3\n9\n").unwrap();
        let mut store = store();
        store.load_test_file(&path).unwrap();
        assert_eq!(store.committed().tests.input, vec![vec!["1", "2"], vec!["3", "6"]]);
        assert_eq!(store.draft().tests.raw_output, "3\n9");

        let missing = dir.path().join("missing.txt");
        let err = store.load_test_file(&missing).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
        assert_eq!(store.committed().tests.input.len(), 2);
    }

    #[test]
    fn test_add_cell_extends_everything() {
        let mut store = store();
        let id = store.add_cell().unwrap();
        assert_eq!(id, CellId(2));
        assert_eq!(store.draft().cells.len(), 3);
        assert_eq!(store.committed().cells.len(), 3);
    }

    #[test]
    fn test_remove_cell_limits() {
        let mut store = store();
        assert!(matches!(store.remove_cell(CellId(0)), Err(Error::CellLimit { min: 2 })));
        store.add_cell().unwrap();
        assert!(matches!(store.remove_cell(CellId(7)), Err(Error::CellNotFound { id: 7, count: 3 })));
        store.remove_cell(CellId(0)).unwrap();
        assert_eq!(store.session().cell_count(), 2);
    }

    #[test]
    fn test_set_language_fills_defaults() {
        let mut store = store();
        store.set_language(CellId(0), "java").unwrap();
        let cell = store.session().cell(CellId(0)).unwrap();
        assert_eq!(cell.version, "21");
        assert_eq!(cell.compiler, "amazoncorretto");

        store.set_version(CellId(1), "3.8").unwrap();
        store.set_language(CellId(1), "python").unwrap();
        assert_eq!(store.session().cell(CellId(1)).unwrap().version, "3.8");
    }

    #[test]
    fn test_failed_save_leaves_session_untouched() {
        let mut store = store();
        let before = store.session().clone();
        store.repo.fail_saves(true);
        assert!(store.add_cell().is_err());
        assert!(store.set_code(CellId(0), "x").is_err());
        assert_eq!(store.session(), &before);
    }

    #[test]
    fn test_load_code_file_infers_language() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solve.cpp");
        std::fs::write(&path, "int f(int a) { return a; }").unwrap();
        let mut store = store();
        store.load_code_file(CellId(1), &path).unwrap();
        let cell = store.session().cell(CellId(1)).unwrap();
        assert_eq!(cell.language, "cpp");
        assert_eq!(cell.compiler, "gcc");
        assert!(cell.code.starts_with("int f"));
    }

    #[test]
    fn test_load_code_file_saves_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solve.py");
        std::fs::write(&path, "def f(a):\n    return a").unwrap();
        let mut store = store();
        let saves = store.repository().saves();
        store.load_code_file(CellId(0), &path).unwrap();
        assert_eq!(store.repository().saves(), saves + 1);

        // A failed save keeps the old code and the old language together
        let before = store.session().clone();
        let cpp = dir.path().join("solve.cpp");
        std::fs::write(&cpp, "int f(int a) { return a; }").unwrap();
        store.repo.fail_saves(true);
        assert!(store.load_code_file(CellId(0), &cpp).is_err());
        assert_eq!(store.session(), &before);
        assert_eq!(store.session().cell(CellId(0)).unwrap().language, "python");
    }
}
