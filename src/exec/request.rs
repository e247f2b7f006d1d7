//! Batch request construction
//!
//! A request pairs each live cell (code, language, version, compiler) with
//! the committed signature at the same position. Argument and return types
//! come from the committed global signature and are shared by every cell.

use crate::common::config::MissingEntryPolicy;
use crate::common::{Error, Result};
use crate::session::{CellId, Session};

use super::protocol::{CellOption, ExecutionRequest, OptionSignature, RequestMessage};

/// A request plus the cells that were left out of it
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltRequest {
    pub request: ExecutionRequest,
    /// Cells with no committed entry, in id order
    pub skipped: Vec<CellId>,
}

/// Snapshot the session into a batch request
pub fn build_request(session: &Session, policy: MissingEntryPolicy) -> Result<BuiltRequest> {
    let committed = &session.committed;
    let global = &committed.global_signature;
    let mut options = Vec::with_capacity(session.cell_count());
    let mut skipped = Vec::new();

    for config in session.cell_configs() {
        let Some(signature) = config.signature else {
            match policy {
                MissingEntryPolicy::Abort => {
                    return Err(Error::PartialConfiguration(config.id.index()));
                }
                MissingEntryPolicy::Skip => {
                    tracing::warn!(cell_id = %config.id, "Cell has no committed settings, leaving it out of the batch");
                    skipped.push(config.id);
                    continue;
                }
            }
        };

        options.push(CellOption {
            cell_id: config.id.index(),
            code: config.cell.code.clone(),
            signature: OptionSignature {
                name: signature.name.clone(),
                args: global.args.clone(),
                return_type: global.return_type.clone(),
            },
            language: config.cell.language.clone(),
            version: config.cell.version.clone(),
            compiler: config.cell.compiler.clone(),
            specs: signature.specs.clone(),
            run_as_is: signature.run_as_is,
        });
    }

    let request = ExecutionRequest {
        message: RequestMessage {
            options,
            input: committed.tests.input.clone(),
            output: committed.tests.output.clone(),
            timeout: committed.timeout,
            generate_test_cases: committed.generate_test_cases,
            test_cases_signature: global.args.clone(),
            test_cases_count: committed.test_case_count,
        },
    };

    tracing::debug!(
        cells = request.message.options.len(),
        skipped = skipped.len(),
        tests = request.message.input.len(),
        "Built batch request"
    );
    Ok(BuiltRequest { request, skipped })
}
