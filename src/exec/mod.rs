//! Batch execution
//!
//! Builds requests from the committed session, submits them to the
//! execution service, and tracks the job while it runs.

pub mod client;
pub mod orchestrator;
pub mod protocol;
pub mod request;

pub use client::{ExecutionService, HttpExecutionService};
pub use orchestrator::{CancelToken, ExecutionJob, JobHandle, JobState, Orchestrator, RunReport};
pub use protocol::{CellOutcome, Differential, ExecutionRequest, ExecutionResult, FailedCase};
pub use request::{build_request, BuiltRequest};
