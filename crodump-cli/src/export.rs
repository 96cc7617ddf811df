//! CSV serialization of a parsed database.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use crodump::{Database, Table};

/// Writes one CSV file per table into `target_dir`, creating it if needed.
///
/// Each file starts with a header row of column names, followed by the
/// records. The `FL`/`Files` blob table is not exported.
pub fn write_tables(db: &Database, target_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(target_dir)
        .with_context(|| format!("failed to create `{}`", target_dir.display()))?;

    let bank_name = db
        .metadata
        .get("BankName")
        .map(String::as_str)
        .unwrap_or("Bank");

    for table in &db.tables {
        if table.is_files() {
            continue;
        }

        let path = table_path(target_dir, bank_name, table);
        // arity-reconciled records are one field longer than the header
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&path)
            .with_context(|| format!("failed to create `{}`", path.display()))?;

        if !table.columns.is_empty() {
            writer.write_record(table.columns.iter().map(|column| column.name.as_str()))?;
        }
        for record in &table.records {
            writer.write_record(record)?;
        }
        writer.flush()?;
    }

    Ok(())
}

fn table_path(target_dir: &Path, bank_name: &str, table: &Table) -> PathBuf {
    let name = format!("{} - {} - {}.csv", bank_name, table.abbr, table.name);
    // table names come from untrusted files; keep them out of other folders
    let name: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    target_dir.join(name)
}
