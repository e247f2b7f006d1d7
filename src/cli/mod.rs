//! CLI command handling
//!
//! Dispatches CLI commands to the session store and orchestrator and
//! formats their output.

mod output;

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::commands::{CellCommands, Commands, ConfigCommands, TestsCommands};
use crate::common::config::{Config, MissingEntryPolicy};
use crate::common::{paths, Error, Result};
use crate::exec::{HttpExecutionService, Orchestrator};
use crate::reconcile;
use crate::session::document::{read_document, write_document};
use crate::session::{
    CellId, FileRepository, LanguageCatalog, SessionConfig, SessionStore,
};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<()> {
    let repo = FileRepository::default_location()?;
    let catalog = LanguageCatalog::with_overrides(&config.languages);
    let mut store = SessionStore::open(repo, config.session.clone(), catalog)?;

    match command {
        Commands::Cell(cmd) => cell_command(&mut store, cmd),

        Commands::Tests(cmd) => match cmd {
            TestsCommands::Set { input, output } => {
                store.commit_tests(&unescape(&input), &unescape(&output))?;
                let tests = &store.committed().tests;
                println!(
                    "Committed {} test inputs and {} outputs",
                    tests.input.len(),
                    tests.output.len()
                );
                Ok(())
            }
            TestsCommands::Load { path } => {
                store.load_test_file(&path)?;
                let tests = &store.committed().tests;
                println!(
                    "Loaded {} test inputs and {} outputs from {}",
                    tests.input.len(),
                    tests.output.len(),
                    path.display()
                );
                Ok(())
            }
            TestsCommands::Show => {
                output::print_tests(store.committed());
                Ok(())
            }
        },

        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { committed } => {
                if !committed {
                    output::print_config("Draft", store.draft());
                    println!();
                }
                output::print_config("Committed", store.committed());
                if !committed && store.draft() != store.committed() {
                    println!();
                    println!("{}", "Draft has uncommitted changes. Run 'cellbench commit'.".yellow());
                }
                Ok(())
            }
            ConfigCommands::Set { key, value } => {
                let setting = DraftSetting::parse(&key, &value)?;
                if let Some(id) = setting.cell() {
                    let count = store.draft().cells.len();
                    if id >= count {
                        return Err(Error::cell_not_found(id, count));
                    }
                }
                store.update_draft(|draft| setting.apply(draft))?;
                println!("Draft {} = {}", key, value);
                Ok(())
            }
        },

        Commands::Commit => {
            store.commit()?;
            println!("Configuration committed");
            Ok(())
        }

        Commands::Run { strict, quiet } => {
            let policy = if strict {
                MissingEntryPolicy::Abort
            } else {
                config.session.missing_entries
            };
            run(&mut store, config, policy, quiet).await
        }

        Commands::Results { json } => {
            let session = store.session();
            let Some(result) = &session.last_result else {
                println!("No results yet. Use 'cellbench run' first.");
                return Ok(());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(result)?);
            } else {
                output::print_view(&reconcile::reconcile(result, session));
            }
            Ok(())
        }

        Commands::Diff => {
            match reconcile::reconcile_last(store.session()).and_then(|v| v.differential) {
                Some(diff) => output::print_differential(&diff),
                None => println!("No differential results. Run with tests first."),
            }
            Ok(())
        }

        Commands::Display {
            time,
            memory,
            terminal,
        } => {
            let mut display = store.session().display;
            if let Some(v) = time {
                display.show_time_metric = v;
            }
            if let Some(v) = memory {
                display.show_memory_metric = v;
            }
            if let Some(v) = terminal {
                display.show_terminal = v;
            }
            store.set_display(display)?;
            println!(
                "time: {}  memory: {}  terminal: {}",
                display.show_time_metric, display.show_memory_metric, display.show_terminal
            );
            Ok(())
        }

        Commands::Export { path } => {
            let doc = store.export_session()?;
            write_document(&path, &doc)?;
            println!("Session exported to {}", path.display());
            Ok(())
        }

        Commands::Import { path } => {
            let doc = read_document(&path)?;
            store.import_session(doc)?;
            println!(
                "Session imported from {} ({} cells)",
                path.display(),
                store.session().cell_count()
            );
            Ok(())
        }

        Commands::Languages { remote } => {
            if remote {
                let service = HttpExecutionService::new(config.service.clone())?;
                let orchestrator = Orchestrator::new(service, &config.polling);
                let languages = orchestrator.fetch_languages().await?;
                store.catalog_mut().merge_remote(&languages);
            }
            output::print_languages(store.catalog());
            Ok(())
        }

        Commands::Settings => {
            match paths::config_path() {
                Some(path) => println!("# {}", path.display()),
                None => println!("# no config directory available"),
            }
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn cell_command(store: &mut SessionStore<FileRepository>, cmd: CellCommands) -> Result<()> {
    match cmd {
        CellCommands::List => output::print_cells(store.session()),
        CellCommands::Add => {
            let id = store.add_cell()?;
            println!("Added cell {}", id);
        }
        CellCommands::Remove { id } => {
            store.remove_cell(CellId(id))?;
            println!(
                "Removed cell {}; {} cells remain",
                id,
                store.session().cell_count()
            );
        }
        CellCommands::Code { id, code } => {
            store.set_code(CellId(id), unescape(&code))?;
            println!("Cell {} code updated", id);
        }
        CellCommands::Lang { id, language } => {
            if store.catalog().get(&language).is_none() {
                println!("{} unknown language '{}'", "warning:".yellow(), language);
            }
            store.set_language(CellId(id), &language)?;
            let cell = &store.session().cells[id];
            println!("Cell {} language {} {} {}", id, cell.language, cell.version, cell.compiler);
        }
        CellCommands::Version { id, version } => {
            store.set_version(CellId(id), version)?;
            println!("Cell {} version updated", id);
        }
        CellCommands::Compiler { id, compiler } => {
            store.set_compiler(CellId(id), compiler)?;
            println!("Cell {} compiler updated", id);
        }
        CellCommands::Load { id, path } => {
            store.load_code_file(CellId(id), &path)?;
            let cell = &store.session().cells[id];
            println!(
                "Loaded {} into cell {} ({})",
                path.display(),
                id,
                if cell.language.is_empty() { "language unknown" } else { cell.language.as_str() }
            );
        }
    }
    Ok(())
}

async fn run(
    store: &mut SessionStore<FileRepository>,
    config: &Config,
    policy: MissingEntryPolicy,
    quiet: bool,
) -> Result<()> {
    if store.draft() != store.committed() {
        println!(
            "{} draft has uncommitted changes; running the committed configuration",
            "note:".cyan()
        );
    }

    let service = HttpExecutionService::new(config.service.clone())?;
    let mut orchestrator = Orchestrator::new(service, &config.polling);

    let progress = (!quiet).then(|| {
        let mut rx = orchestrator.subscribe();
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::with_template("  [{bar:40.cyan/blue}] {pos}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let job = *rx.borrow_and_update();
                pb.set_position((job.progress * 100.0).round() as u64);
                pb.set_message(job.state.to_string());
                if job.state.is_terminal() {
                    break;
                }
            }
            pb.finish_and_clear();
        })
    });

    let outcome = orchestrator.run_session(store, policy).await;
    drop(orchestrator);
    if let Some(task) = progress {
        let _ = task.await;
    }
    let report = outcome?;

    for id in &report.skipped {
        println!("{} cell {} was skipped: it has no committed settings", "warning:".yellow(), id);
    }
    if let Some(view) = reconcile::reconcile_last(store.session()) {
        output::print_view(&view);
    }
    Ok(())
}

/// A single draft edit requested from the command line
#[derive(Debug, Clone, PartialEq)]
enum DraftSetting {
    Timeout(u64),
    GenerateTestCases(bool),
    TestCaseCount(u32),
    Args(String),
    Return(String),
    CellName(usize, String),
    CellSpecs(usize, String),
    CellRunAsIs(usize, bool),
}

impl DraftSetting {
    fn parse(key: &str, value: &str) -> Result<Self> {
        let invalid = |what: &str| Error::Config(format!("{} expects {}, got '{}'", key, what, value));
        let setting = match key {
            "timeout" => Self::Timeout(value.parse().map_err(|_| invalid("seconds"))?),
            "generate_test_cases" => {
                Self::GenerateTestCases(value.parse().map_err(|_| invalid("true or false"))?)
            }
            "test_case_count" => Self::TestCaseCount(value.parse().map_err(|_| invalid("a count"))?),
            "args" => Self::Args(value.to_string()),
            "return" => Self::Return(value.to_string()),
            _ => {
                let Some((id, field)) = key
                    .strip_prefix("cell.")
                    .and_then(|rest| rest.split_once('.'))
                else {
                    return Err(Error::Config(format!("unknown setting '{}'", key)));
                };
                let id: usize = id
                    .parse()
                    .map_err(|_| Error::Config(format!("'{}' is not a cell id", id)))?;
                match field {
                    "name" => Self::CellName(id, value.to_string()),
                    "specs" => Self::CellSpecs(id, value.to_string()),
                    "run_as_is" => {
                        Self::CellRunAsIs(id, value.parse().map_err(|_| invalid("true or false"))?)
                    }
                    _ => return Err(Error::Config(format!("unknown cell setting '{}'", field))),
                }
            }
        };
        Ok(setting)
    }

    fn cell(&self) -> Option<usize> {
        match self {
            Self::CellName(id, _) | Self::CellSpecs(id, _) | Self::CellRunAsIs(id, _) => Some(*id),
            _ => None,
        }
    }

    fn apply(self, draft: &mut SessionConfig) {
        match self {
            Self::Timeout(v) => draft.timeout = v,
            Self::GenerateTestCases(v) => draft.generate_test_cases = v,
            Self::TestCaseCount(v) => draft.test_case_count = v,
            Self::Args(v) => draft.global_signature.args = v,
            Self::Return(v) => draft.global_signature.return_type = v,
            Self::CellName(id, v) => {
                if let Some(cell) = draft.cells.get_mut(id) {
                    cell.name = v;
                }
            }
            Self::CellSpecs(id, v) => {
                if let Some(cell) = draft.cells.get_mut(id) {
                    cell.specs = v;
                }
            }
            Self::CellRunAsIs(id, v) => {
                if let Some(cell) = draft.cells.get_mut(id) {
                    cell.run_as_is = v;
                }
            }
        }
    }
}

/// Turn literal `\n` sequences typed on the command line into newlines
fn unescape(text: &str) -> String {
    text.replace("\\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_setting_parse() {
        assert_eq!(DraftSetting::parse("timeout", "30").unwrap(), DraftSetting::Timeout(30));
        assert_eq!(
            DraftSetting::parse("cell.1.run_as_is", "true").unwrap(),
            DraftSetting::CellRunAsIs(1, true)
        );
        assert!(DraftSetting::parse("timeout", "soon").is_err());
        assert!(DraftSetting::parse("cell.x.name", "f").is_err());
        assert!(DraftSetting::parse("colour", "blue").is_err());
    }

    #[test]
    fn test_draft_setting_apply() {
        let mut draft = SessionConfig::with_cells(2);
        DraftSetting::parse("cell.1.name", "solve").unwrap().apply(&mut draft);
        DraftSetting::parse("args", "int, int").unwrap().apply(&mut draft);
        assert_eq!(draft.cells[1].name, "solve");
        assert_eq!(draft.global_signature.args, "int, int");
        assert_eq!(DraftSetting::CellName(0, String::new()).cell(), Some(0));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("1, 2\\n3, 6"), "1, 2\n3, 6");
    }
}
