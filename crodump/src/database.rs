//! Entry points for parsing a database directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::bank::Records;
use crate::catalog::{self, Metadata, Table};
use crate::cipher;
use crate::error::{CronosError, CronosErrorKind};
use crate::raw;

/// A fully parsed Cronos database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    /// Decoded `BankId`/`BankName` metadata; either field may be absent.
    pub metadata: Metadata,
    /// Tables in discovery order, each with its records in index order.
    pub tables: Vec<Table>,
}

impl Database {
    /// Parses the Cronos database located in `folder`.
    ///
    /// The folder must contain `CroStru.dat`, `CroBank.tad` and
    /// `CroBank.dat`; file names are matched case-insensitively. The
    /// `FL`/`Files` blob table is returned like any other table, but with
    /// no records.
    pub fn parse<P: AsRef<Path>>(folder: P) -> Result<Database, CronosError> {
        let folder = folder.as_ref();
        let stru_dat = find_file(folder, raw::STRU_DAT)?;
        let bank_tad = find_file(folder, raw::BANK_TAD)?;
        let bank_dat = find_file(folder, raw::BANK_DAT)?;

        let data = fs::read(stru_dat)?;
        let (metadata, mut tables) = parse_structure(&data)?;

        for table in &mut tables {
            if table.is_files() {
                // file blobs, not field records
                continue;
            }
            let records = Records::open(&bank_tad, &bank_dat, Some(table))?;
            table.records = records.collect();
            tracing::debug!(
                table = %table.name,
                records = table.records.len(),
                "reassembled records"
            );
        }

        Ok(Database { metadata, tables })
    }
}

/// Parses the catalog out of in-memory structure-file bytes.
///
/// The first recovered section, the one with the earliest sentinel, is
/// canonical for metadata; tables are collected from every section in
/// sentinel order. Records are left unpopulated.
pub fn parse_structure(data: &[u8]) -> Result<(Metadata, Vec<Table>), CronosError> {
    if !data.starts_with(&raw::CROFILE_MAGIC) {
        return Err(CronosErrorKind::NotAStructureFile.into());
    }

    let sections = cipher::align_sections(data);
    let Some(first) = sections.first() else {
        return Err(CronosErrorKind::SectionsUnrecovered.into());
    };

    let metadata = catalog::parse_metadata(&first.bytes);
    let tables = sections
        .iter()
        .flat_map(|section| catalog::scan_tables(&section.bytes))
        .collect();

    Ok((metadata, tables))
}

/// Looks up `name` in `folder`, ignoring case.
fn find_file(folder: &Path, name: &str) -> Result<PathBuf, CronosError> {
    if !folder.is_dir() {
        return Err(CronosError::new(
            CronosErrorKind::NotADirectory,
            format!("`{}` is not a folder path", folder.display()),
        ));
    }

    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().eq_ignore_ascii_case(name) {
            return Ok(entry.path());
        }
    }

    Err(CronosError::new(
        CronosErrorKind::MissingFile,
        format!("`{name}` not found in `{}`", folder.display()),
    ))
}
