//! Terminal formatting for session state and results

use colored::Colorize;

use crate::reconcile::{CellView, DifferentialView, SessionView};
use crate::session::{LanguageCatalog, Session, SessionConfig};

pub fn print_cells(session: &Session) {
    for config in session.cell_configs() {
        let cell = config.cell;
        let language = if cell.language.is_empty() {
            "(no language)".dimmed().to_string()
        } else {
            cell.language.bold().to_string()
        };
        let mut toolchain = Vec::new();
        if !cell.version.is_empty() {
            toolchain.push(cell.version.as_str());
        }
        if !cell.compiler.is_empty() {
            toolchain.push(cell.compiler.as_str());
        }
        let name = match config.signature {
            Some(sig) if !sig.name.is_empty() => sig.name.clone(),
            Some(_) => "-".to_string(),
            None => "(not committed)".yellow().to_string(),
        };
        println!(
            "[{}] {} {}  fn: {}  {} lines",
            config.id,
            language,
            toolchain.join(" ").dimmed(),
            name,
            cell.code.lines().count()
        );
    }
}

pub fn print_config(label: &str, config: &SessionConfig) {
    println!("{}", label.cyan().bold());
    println!(
        "  signature: ({}) -> {}",
        config.global_signature.args, config.global_signature.return_type
    );
    println!("  timeout: {}s", config.timeout);
    println!(
        "  generate tests: {} (count {})",
        config.generate_test_cases, config.test_case_count
    );
    println!("  tests: {} input rows, {} output rows", config.tests.input.len(), config.tests.output.len());
    for (i, cell) in config.cells.iter().enumerate() {
        let mut flags = Vec::new();
        if cell.run_as_is {
            flags.push("run as is".to_string());
        }
        if !cell.specs.is_empty() {
            flags.push(format!("specs: {}", cell.specs));
        }
        println!("  cell {}: name {:?} {}", i, cell.name, flags.join(", ").dimmed());
    }
}

pub fn print_tests(config: &SessionConfig) {
    let tests = &config.tests;
    if tests.input.is_empty() && tests.output.is_empty() {
        println!("No tests committed");
        return;
    }
    let rows = tests.input.len().max(tests.output.len());
    for i in 0..rows {
        let input = tests.input.get(i).map(|r| r.join(", ")).unwrap_or_default();
        let output = tests.output.get(i).map(|r| r.join(", ")).unwrap_or_default();
        println!("{:>3}  {}  {}  {}", i + 1, input, "=>".dimmed(), output);
    }
    if tests.input.len() != tests.output.len() {
        println!(
            "{} {} inputs but {} outputs",
            "warning:".yellow(),
            tests.input.len(),
            tests.output.len()
        );
    }
}

pub fn print_view(view: &SessionView) {
    for cell in &view.cells {
        print_cell_view(cell);
    }
    if let Some(diff) = &view.differential {
        println!();
        print_summary(diff);
    }
}

fn print_cell_view(cell: &CellView) {
    let header = format!("Cell {}", cell.id);
    let Some(output) = &cell.output else {
        println!("{} {}", header.bold(), "(no output)".dimmed());
        return;
    };

    match &output.error {
        Some(error) => println!("{} {} {}", header.bold(), "✗".red(), error.red()),
        None => println!("{} {} {}", header.bold(), "✓".green(), output.value),
    }

    let mut metrics = Vec::new();
    if let Some(time) = &output.execution_time {
        metrics.push(format!("time {}", time));
    }
    if let Some(memory) = &output.memory_usage {
        metrics.push(format!("memory {}", memory));
    }
    if !metrics.is_empty() {
        println!("  {}", metrics.join("  ").dimmed());
    }

    if let Some(terminal) = &output.terminal {
        for (test, text) in terminal {
            println!("  {} {}", format!("#{}", test).dimmed(), text);
        }
    }
}

fn print_summary(diff: &DifferentialView) {
    println!("Tests: {}", diff.test_count);
    println!("  {} matched", diff.matched.to_string().green());
    println!("  {} failed", diff.no_match.to_string().red());
    if !diff.is_consistent() {
        println!(
            "  {} service reported {} failures but listed {}",
            "warning:".yellow(),
            diff.no_match,
            diff.failed.len()
        );
    }
}

pub fn print_differential(diff: &DifferentialView) {
    print_summary(diff);
    for case in &diff.failed {
        println!();
        println!("{} {}", "Input:".cyan(), case.input);
        if let Some(expected) = &case.expected {
            println!("  expected  {}", expected.bold());
        }
        for entry in &case.entries {
            let label = match entry.cell {
                Some(id) => format!("cell {}", id),
                None => entry.key.clone(),
            };
            match &entry.error {
                Some(error) => println!("  {:<8}  {} {}", label, entry.value, error.red()),
                None => println!("  {:<8}  {}", label, entry.value),
            }
        }
    }
}

pub fn print_languages(catalog: &LanguageCatalog) {
    for profile in catalog.profiles() {
        let defaults = [
            profile.default_version.as_deref(),
            profile.default_compiler.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" / ");
        println!("{} {}", profile.id.bold(), defaults.dimmed());
        if !profile.versions.is_empty() {
            println!("  versions:  {}", profile.versions.join(", "));
        }
        if !profile.compilers.is_empty() {
            println!("  compilers: {}", profile.compilers.join(", "));
        }
    }
}
