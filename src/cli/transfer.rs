//! Import, export, and reset commands

use std::fs;
use std::path::Path;

use super::report_ignored;
use crate::error::{TallyError, TallyResult};
use crate::ledger::Ledger;
use crate::services::{parse_import_file, ImportMode};

/// Handle `tally export [FILE]`; prints to stdout without a file
pub fn handle_export_command(ledger: &Ledger, file: Option<&Path>) -> TallyResult<()> {
    let Some(export) = report_ignored(ledger.export()?, "export") else {
        return Ok(());
    };
    let json = export.to_json()?;

    match file {
        Some(path) => {
            fs::write(path, json).map_err(|e| {
                TallyError::Export(format!("Failed to write {}: {}", path.display(), e))
            })?;
            println!(
                "Exported {} budgets and {} expenses to {}",
                export.budgets.len(),
                export.expenses.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Handle `tally import FILE [--replace]`
pub fn handle_import_command(ledger: &Ledger, file: &Path, replace: bool) -> TallyResult<()> {
    let text = fs::read_to_string(file)
        .map_err(|e| TallyError::Import(format!("Failed to read {}: {}", file.display(), e)))?;
    let contents = parse_import_file(&text)?;
    let mode = if replace {
        ImportMode::Replace
    } else {
        ImportMode::Merge
    };

    if let Some(report) = report_ignored(ledger.import(mode, contents)?, "import") {
        println!(
            "Imported {} budgets and {} expenses",
            report.budgets_imported, report.expenses_imported
        );
        if !report.conflicts.is_empty() {
            println!(
                "Skipped {} documents whose id already exists",
                report.conflicts.len()
            );
        }
    }
    Ok(())
}

/// Handle `tally reset`
pub fn handle_reset_command(ledger: &Ledger, confirmed: bool) -> TallyResult<()> {
    if !confirmed {
        println!("This deletes every budget and expense, including on the sync remote.");
        println!("Run 'tally reset --yes' to confirm.");
        return Ok(());
    }

    if report_ignored(ledger.delete_all_data()?, "reset").is_some() {
        println!("All data deleted.");
    }
    Ok(())
}
