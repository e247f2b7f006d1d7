//! CLI command definitions
//!
//! Defines the clap commands for the cellbench CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Add, remove and edit cells
    #[command(subcommand)]
    Cell(CellCommands),

    /// Set or load test data
    #[command(subcommand)]
    Tests(TestsCommands),

    /// Inspect or edit the draft run configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Copy the draft configuration into the committed one
    Commit,

    /// Run every cell against the committed tests
    Run {
        /// Fail instead of skipping cells without committed settings
        #[arg(long)]
        strict: bool,

        /// Don't draw a progress bar
        #[arg(long)]
        quiet: bool,
    },

    /// Show per-cell results of the last run
    Results {
        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the differential summary of the last run
    Diff,

    /// Choose what result views show
    Display {
        /// Show execution time
        #[arg(long)]
        time: Option<bool>,

        /// Show memory usage
        #[arg(long)]
        memory: Option<bool>,

        /// Show raw per-test output
        #[arg(long)]
        terminal: Option<bool>,
    },

    /// Save the session to a file
    Export {
        /// Destination file
        path: PathBuf,
    },

    /// Replace the session with one saved by 'export'
    Import {
        /// Session file
        path: PathBuf,
    },

    /// List known languages, versions and compilers
    Languages {
        /// Ask the execution service for its current catalog
        #[arg(long)]
        remote: bool,
    },

    /// Print the effective settings file
    Settings,
}

#[derive(Subcommand)]
pub enum CellCommands {
    /// List cells
    List,

    /// Append an empty cell
    Add,

    /// Remove a cell; later cells move down by one
    Remove {
        /// Cell id
        id: usize,
    },

    /// Set a cell's code
    Code {
        /// Cell id
        id: usize,

        /// Source text
        code: String,
    },

    /// Set a cell's language (fills in default version and compiler)
    Lang {
        /// Cell id
        id: usize,

        /// Language id (e.g. python, cpp, java)
        language: String,
    },

    /// Set a cell's language version
    Version {
        /// Cell id
        id: usize,

        version: String,
    },

    /// Set a cell's compiler
    Compiler {
        /// Cell id
        id: usize,

        compiler: String,
    },

    /// Load a cell's code from a source file
    Load {
        /// Cell id
        id: usize,

        /// Source file; the extension picks the language
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum TestsCommands {
    /// Parse input and output rows and commit them
    Set {
        /// Input rows, one test per line (e.g. "1, 2")
        #[arg(long, short)]
        input: String,

        /// Expected output rows, one per input line
        #[arg(long, short)]
        output: String,
    },

    /// Load a test file with 'input' and 'output' sections
    Load {
        /// Test file
        path: PathBuf,
    },

    /// Show committed tests
    Show,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the draft and committed configuration
    Show {
        /// Show only the committed configuration
        #[arg(long)]
        committed: bool,
    },

    /// Set a draft value
    ///
    /// Keys: timeout, generate_test_cases, test_case_count, args, return,
    /// cell.<id>.name, cell.<id>.specs, cell.<id>.run_as_is
    Set {
        key: String,
        value: String,
    },
}
