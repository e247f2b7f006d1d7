//! Session persistence
//!
//! The store talks to storage only through [`SessionRepository`], so the
//! same session logic runs against a JSON file or plain memory.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::common::{paths, Error, Result};

use super::document::SessionDocument;
use super::model::Session;

/// Where a session is loaded from and saved to
pub trait SessionRepository: Send {
    /// Previously saved session, or `None` when nothing was saved yet
    fn load(&self) -> Result<Option<Session>>;

    /// Persist the complete session
    fn save(&mut self, session: &Session) -> Result<()>;
}

/// Session stored as a JSON document on disk
#[derive(Debug, Clone)]
pub struct FileRepository {
    path: PathBuf,
}

impl FileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Repository at the default session location
    pub fn default_location() -> Result<Self> {
        paths::session_path()
            .map(Self::new)
            .ok_or_else(|| Error::Config("could not determine a data directory for the session file".into()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionRepository for FileRepository {
    fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path).map_err(|e| Error::FileRead {
            path: self.path.display().to_string(),
            error: e.to_string(),
        })?;
        let session = SessionDocument::from_json(&text)
            .and_then(SessionDocument::restore)
            .map_err(|e| Error::SessionLoad {
                path: self.path.display().to_string(),
                reason: match e {
                    Error::ImportIntegrity(reason) => reason,
                    other => other.to_string(),
                },
            })?;
        tracing::debug!(path = %self.path.display(), cells = session.cell_count(), "Loaded session");
        Ok(Some(session))
    }

    fn save(&mut self, session: &Session) -> Result<()> {
        let text = SessionDocument::snapshot(session)?.to_json_pretty()?;
        paths::ensure_parent_dir(&self.path)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        // Readers see either the previous file or the new one
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::trace!(path = %self.path.display(), "Saved session");
        Ok(())
    }
}

/// Session held in memory only
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    stored: Option<Session>,
    saves: usize,
    fail_saves: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository that starts out holding `session`
    pub fn with_session(session: Session) -> Self {
        Self {
            stored: Some(session),
            ..Default::default()
        }
    }

    /// Make every subsequent save fail
    pub fn fail_saves(&mut self, fail: bool) {
        self.fail_saves = fail;
    }

    pub fn stored(&self) -> Option<&Session> {
        self.stored.as_ref()
    }

    /// Number of successful saves
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl SessionRepository for MemoryRepository {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.stored.clone())
    }

    fn save(&mut self, session: &Session) -> Result<()> {
        if self.fail_saves {
            return Err(Error::Io(std::io::Error::other("session storage unavailable")));
        }
        self.stored = Some(session.clone());
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_repository_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path().join("session.json"));
        assert!(repo.load().unwrap().is_none());
    }

    #[test]
    fn test_file_repository_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo = FileRepository::new(dir.path().join("state").join("session.json"));
        let mut session = Session::new(3);
        session.draft.timeout = 10;
        session.cells[2].code = "print(1)".into();
        repo.save(&session).unwrap();
        assert_eq!(repo.load().unwrap(), Some(session));
    }

    #[test]
    fn test_file_repository_rewrite_drops_stale_cell_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut repo = FileRepository::new(&path);
        repo.save(&Session::new(3)).unwrap();
        repo.save(&Session::new(2)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("cell.1.code"));
        assert!(!text.contains("cell.2.code"));
    }

    #[test]
    fn test_file_repository_corrupt_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{\"format_version\": 1").unwrap();
        let repo = FileRepository::new(&path);
        let err = repo.load().unwrap_err();
        assert!(matches!(err, Error::SessionLoad { .. }));
        let message = err.to_string();
        assert!(message.contains("session.json"));
        assert!(!message.contains("import"));
    }

    #[test]
    fn test_memory_repository_failure() {
        let mut repo = MemoryRepository::new();
        repo.fail_saves(true);
        assert!(repo.save(&Session::default()).is_err());
        assert!(repo.stored().is_none());
        assert_eq!(repo.saves(), 0);
    }
}
