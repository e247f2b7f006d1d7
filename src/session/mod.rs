//! Session state
//!
//! Cells, the draft and committed run configuration, the last result, and
//! the machinery that keeps them consistent across edits, reloads and
//! imports.

pub mod document;
pub mod languages;
pub mod model;
pub mod repository;
pub mod store;

pub use document::SessionDocument;
pub use languages::{LanguageCatalog, LanguageProfile};
pub use model::{
    Cell, CellConfig, CellId, CellSignature, DisplayConfig, GlobalSignature, Remap, Session,
    SessionConfig, TestSpecification,
};
pub use repository::{FileRepository, MemoryRepository, SessionRepository};
pub use store::SessionStore;
