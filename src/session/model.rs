//! Session data model
//!
//! A session is an ordered list of live cells plus two copies of the run
//! configuration: the draft being edited and the committed (final) copy
//! that runs are built from. Cell ids are positions, so removing a cell
//! shifts every later cell down by one; [`Remap`] carries that shift into
//! each structure keyed by cell.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::exec::protocol::ExecutionResult;
use crate::testspec::TestCase;

/// Position of a cell in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub usize);

impl CellId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for CellId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live, per-cell editor state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub compiler: String,
}

/// Per-cell part of the run configuration
///
/// Argument and return types live in [`GlobalSignature`]; per-cell `args`
/// and `return` keys in older documents are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSignature {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub specs: String,
    #[serde(default)]
    pub run_as_is: bool,
}

/// Argument and return types shared by every cell in a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSignature {
    #[serde(default)]
    pub args: String,
    #[serde(default, rename = "return")]
    pub return_type: String,
}

/// Test data as typed and as parsed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSpecification {
    #[serde(default)]
    pub raw_input: String,
    #[serde(default)]
    pub raw_output: String,
    #[serde(default)]
    pub input: Vec<TestCase>,
    #[serde(default)]
    pub output: Vec<TestCase>,
}

/// Run configuration, held once as draft and once as committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub cells: Vec<CellSignature>,

    #[serde(default)]
    pub global_signature: GlobalSignature,

    #[serde(default)]
    pub tests: TestSpecification,

    /// Per-run timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub generate_test_cases: bool,

    #[serde(default = "default_test_case_count")]
    pub test_case_count: u32,
}

fn default_timeout() -> u64 {
    60
}

fn default_test_case_count() -> u32 {
    25
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            global_signature: GlobalSignature::default(),
            tests: TestSpecification::default(),
            timeout: default_timeout(),
            generate_test_cases: false,
            test_case_count: default_test_case_count(),
        }
    }
}

impl SessionConfig {
    /// Default configuration with `n` empty cell signatures
    pub fn with_cells(n: usize) -> Self {
        Self {
            cells: vec![CellSignature::default(); n],
            ..Default::default()
        }
    }
}

/// What the result views show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub show_time_metric: bool,
    #[serde(default = "default_true")]
    pub show_memory_metric: bool,
    /// Raw per-test output of each cell
    #[serde(default = "default_true")]
    pub show_terminal: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_time_metric: true,
            show_memory_metric: true,
            show_terminal: true,
        }
    }
}

/// A cell joined with its committed signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellConfig<'a> {
    pub id: CellId,
    pub cell: &'a Cell,
    /// `None` when the committed config has no entry for this position
    pub signature: Option<&'a CellSignature>,
}

/// Aggregate root of one user session
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub cells: Vec<Cell>,
    pub draft: SessionConfig,
    pub committed: SessionConfig,
    pub last_result: Option<ExecutionResult>,
    pub display: DisplayConfig,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Session {
    /// Fresh session with `n` empty cells
    pub fn new(n: usize) -> Self {
        Self {
            cells: vec![Cell::default(); n],
            draft: SessionConfig::with_cells(n),
            committed: SessionConfig::with_cells(n),
            last_result: None,
            display: DisplayConfig::default(),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.index())
    }

    /// Live cell plus committed signature at `id`
    pub fn cell_config(&self, id: CellId) -> Option<CellConfig<'_>> {
        let cell = self.cells.get(id.index())?;
        Some(CellConfig {
            id,
            cell,
            signature: self.committed.cells.get(id.index()),
        })
    }

    /// Every cell in execution order
    pub fn cell_configs(&self) -> impl Iterator<Item = CellConfig<'_>> {
        self.cells.iter().enumerate().map(move |(i, cell)| CellConfig {
            id: CellId(i),
            cell,
            signature: self.committed.cells.get(i),
        })
    }

    /// Shift every cell-keyed structure through `remap`
    pub(crate) fn apply_remap(&mut self, remap: &Remap) {
        self.cells = remap.apply_vec(std::mem::take(&mut self.cells));
        self.draft.cells = remap.apply_vec(std::mem::take(&mut self.draft.cells));
        self.committed.cells = remap.apply_vec(std::mem::take(&mut self.committed.cells));
        if let Some(result) = self.last_result.as_mut() {
            remap.apply_result(result);
        }
    }
}

/// Old-to-new cell index mapping after removing one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remap {
    removed: usize,
}

impl Remap {
    pub fn removing(id: CellId) -> Self {
        Self { removed: id.index() }
    }

    /// New index of the cell formerly at `old`, `None` for the removed one
    pub fn apply(&self, old: usize) -> Option<usize> {
        match old.cmp(&self.removed) {
            std::cmp::Ordering::Less => Some(old),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(old - 1),
        }
    }

    /// Drop the removed position from a positional list
    pub fn apply_vec<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| self.apply(i).map(|_| item))
            .collect()
    }

    /// Re-key per-cell result entries; non-numeric keys pass through
    pub fn apply_result(&self, result: &mut ExecutionResult) {
        let cells = std::mem::take(&mut result.cells);
        result.cells = cells
            .into_iter()
            .filter_map(|(old, outcome)| self.apply(old).map(|new| (new, outcome)))
            .collect::<BTreeMap<_, _>>();

        if let Some(diff) = result.differential.as_mut() {
            for case in &mut diff.failed {
                let entries = std::mem::take(&mut case.cells);
                let mut rekeyed = Map::new();
                for (key, value) in entries {
                    match key.parse::<usize>() {
                        Ok(old) => {
                            if let Some(new) = self.apply(old) {
                                rekeyed.insert(new.to_string(), value);
                            }
                        }
                        Err(_) => {
                            rekeyed.insert(key, value);
                        }
                    }
                }
                case.cells = rekeyed;
            }
        }
    }
}
