//! Catalog recovery: database metadata, tables and columns.
//!
//! Table and column definitions sit at unpredictable positions inside a
//! deciphered section, so they are located with byte-level probes: metadata
//! fields by their length-prefixed labels, tables by the three-null anchor
//! that follows the table id. An anchor hit that fails verification is
//! ordinary data and the scan resumes one byte further.

use std::collections::BTreeMap;

use scroll::{Pread, BE, LE};

use crate::bank::Record;
use crate::raw;
use crate::text;

/// Decoded database metadata. Both well-known fields are optional.
pub type Metadata = BTreeMap<String, String>;

/// Field labels probed for in the canonical section.
const METADATA_FIELDS: &[&str] = &["BankId", "BankName"];

/// The anchor every table definition carries after its id byte.
const ANCHOR: [u8; 3] = [0, 0, 0];

/// Fixed part of a column record: length, type, id and name length.
const COLUMN_HEADER: usize = 12;

/// Unexplained bytes between the second verification byte and the column
/// count.
const TABLE_HEADER_GAP: usize = 4;

/// Unexplained bytes between two column records.
const COLUMN_GAP: usize = 2;

/// A column definition inside a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column id.
    pub id: u16,
    /// Numeric Cronos type tag; preserved but not interpreted.
    pub ty: u16,
    /// Decoded column name.
    pub name: String,
}

/// A table definition together with its reassembled records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Table id; the first byte of every record payload refers back to it.
    pub id: u8,
    /// Decoded table name.
    pub name: String,
    /// Two-character table abbreviation.
    pub abbr: String,
    /// Columns in definition order, matching positional record fields.
    pub columns: Vec<Column>,
    /// Populated by the record reassembly stage; empty until then.
    pub records: Vec<Record>,
}

impl Table {
    /// Whether this is the `FL`/`Files` blob table. It stores file contents
    /// referenced from other tables and does not decode as field records.
    pub fn is_files(&self) -> bool {
        self.abbr == "FL" && self.name == "Files"
    }
}

/// Extracts the well-known metadata fields from a deciphered section.
///
/// Each present field is stored as its length-prefixed label, followed by a
/// vword whose low 24 bits give the value length, followed by the value
/// bytes. Absent fields are skipped.
pub fn parse_metadata(bytes: &[u8]) -> Metadata {
    let mut metadata = Metadata::new();

    for field in METADATA_FIELDS {
        let probe = text::sentinel(field);
        let Some(index) = text::find(bytes, &probe, 0) else {
            tracing::debug!(field, "metadata field not found");
            continue;
        };
        let offset = index + probe.len();
        let Some((length, _flags)) = vword(bytes, offset) else {
            continue;
        };
        let start = offset + 4;
        let Some(value) = bytes.get(start..start + length) else {
            continue;
        };
        metadata.insert((*field).to_owned(), text::decode(value));
    }

    metadata
}

/// Splits a little-endian vword into its 24-bit length and 8-bit flags.
fn vword(bytes: &[u8], offset: usize) -> Option<(usize, u8)> {
    let word: u32 = bytes.pread_with(offset, LE).ok()?;
    Some(((word & 0x00ff_ffff) as usize, (word >> 24) as u8))
}

/// Scans a deciphered section for table definitions.
///
/// Accepted tables move the cursor to their end, so two definitions never
/// overlap; rejected anchor sites move it by one byte.
pub fn scan_tables(bytes: &[u8]) -> Vec<Table> {
    let mut tables = Vec::new();
    // the table id sits right before the anchor, so never match at zero
    let mut cursor = 1;

    while let Some(index) = text::find(bytes, &ANCHOR, cursor) {
        match parse_table(bytes, index - 1) {
            Some((table, end)) => {
                // a bogus column length could place the end at or before
                // the anchor; the cursor must always advance
                cursor = end.max(index + 1);
                tables.push(table);
            }
            None => {
                tracing::debug!(index, "anchor candidate rejected");
                cursor = index + 1;
            }
        }
    }

    tables
}

/// Parses one table definition starting at its id byte. Returns the table
/// and the offset of its end, or `None` if the site fails verification.
fn parse_table(bytes: &[u8], start: usize) -> Option<(Table, usize)> {
    let mut offset = start;

    let id: u8 = bytes.gread_with(&mut offset, BE).ok()?;
    offset += ANCHOR.len();

    let name_len = bytes.gread_with::<u8>(&mut offset, BE).ok()? as usize;
    if name_len == 0 {
        return None;
    }
    let name_bytes = bytes.get(offset..offset + name_len)?;
    offset += name_len;

    if bytes.gread_with::<u8>(&mut offset, BE).ok()? != raw::TABLE_VERIFY_A {
        return None;
    }
    let abbr_bytes = bytes.get(offset..offset + 2)?;
    offset += 2;
    if bytes.gread_with::<u8>(&mut offset, BE).ok()? != raw::TABLE_VERIFY_B {
        return None;
    }

    let name = text::decode_strict(name_bytes)?;
    let abbr = text::decode(abbr_bytes);

    offset += TABLE_HEADER_GAP;
    let (columns, end) = parse_columns(bytes, offset)?;

    let table = Table {
        id,
        name,
        abbr,
        columns,
        records: Vec::new(),
    };
    Some((table, end))
}

/// Parses the column list of a table. Returns the columns and the offset of
/// the last column's end.
///
/// Reads exactly the advertised number of columns, stopping early only when
/// the section ends. A count the whole section could never hold rejects the
/// site.
fn parse_columns(bytes: &[u8], start: usize) -> Option<(Vec<Column>, usize)> {
    let mut offset = start;
    let count = bytes.gread_with::<u32>(&mut offset, BE).ok()? as usize;
    if count > bytes.len() / COLUMN_HEADER {
        return None;
    }

    let mut columns = Vec::with_capacity(count);
    let mut end = offset;

    for _ in 0..count {
        let Some((column, column_end)) = parse_column(bytes, offset) else {
            break;
        };
        columns.push(column);
        end = column_end;
        offset = column_end + COLUMN_GAP;
    }

    Some((columns, end))
}

/// Parses one column record. Returns the column and the offset of its end
/// as given by the record's own length field.
fn parse_column(bytes: &[u8], start: usize) -> Option<(Column, usize)> {
    let mut offset = start;

    let length = bytes.gread_with::<u32>(&mut offset, BE).ok()? as usize;
    let ty = bytes.gread_with::<u16>(&mut offset, BE).ok()?;
    let id = bytes.gread_with::<u16>(&mut offset, BE).ok()?;
    let name_len = bytes.gread_with::<u32>(&mut offset, BE).ok()? as usize;
    let name_bytes = bytes.get(offset..offset + name_len)?;

    let column = Column {
        id,
        ty,
        name: text::decode(name_bytes),
    };
    Some((column, start + length))
}
