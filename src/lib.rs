//! cellbench - differential testing across independently configured cells
//!
//! A session holds several cells, each with its own code, language and
//! toolchain. The committed configuration and test data are sent to an
//! execution service as one batch, and the per-cell outputs are compared
//! against the expected values.

pub mod cli;
pub mod commands;
pub mod common;
pub mod exec;
pub mod reconcile;
pub mod session;
pub mod testspec;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use exec::{ExecutionService, JobState, Orchestrator};
pub use session::{Session, SessionStore};
