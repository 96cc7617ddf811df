//! Record reassembly from the index and data files.
//!
//! `CroBank.tad` is a dense array of 12-byte entries, one per record. Each
//! entry points at the first fragment of its record in `CroBank.dat`;
//! every further fragment is a 256-byte cell that starts with a pointer to
//! the next one. A chain ends when the remaining length reaches one of the
//! chain-end markers.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use scroll::{Pread, LE};

use crate::catalog::Table;
use crate::error::{CronosError, CronosErrorKind};
use crate::raw;
use crate::text;

/// One reassembled record: the decoded field values in column order.
pub type Record = Vec<String>;

/// A 12-byte index entry.
#[derive(Clone, Copy, Debug, Pread)]
struct TadEntry {
    offset: u32,
    length: u16,
    next_offset: u32,
    next_length: u16,
}

impl TadEntry {
    /// An entry with no first fragment and a terminated chain never had a
    /// record, as opposed to having an empty one.
    fn is_empty(&self) -> bool {
        self.length == 0 && chain_ended(self.next_length)
    }
}

fn chain_ended(next_length: u16) -> bool {
    next_length == raw::CHAIN_END || next_length == raw::CHAIN_END_MARKER
}

/// Streams reassembled records out of the index and data files.
///
/// The iterator owns its two buffered file handles; both are closed when it
/// is dropped. Entries that carry no record, fail to read, or belong to
/// another table are skipped silently.
pub struct Records {
    tad: BufReader<File>,
    dat: BufReader<File>,
    table_id: Option<u8>,
    column_count: Option<usize>,
    index: u64,
}

impl Records {
    /// Opens the index and data files and positions the walk at the first
    /// index entry.
    ///
    /// Verifies the `CroFile` signature of the data file. When `table` is
    /// given, only records whose leading table-id byte matches are yielded,
    /// and records whose field count deviates from the table's column count
    /// get the 1-based entry ordinal prepended as a provenance marker.
    pub fn open(
        tad_path: &Path,
        dat_path: &Path,
        table: Option<&Table>,
    ) -> Result<Records, CronosError> {
        let mut dat = BufReader::new(File::open(dat_path)?);
        let mut signature = [0u8; raw::CROFILE_MAGIC.len()];
        if dat.read_exact(&mut signature).is_err() || signature != raw::CROFILE_MAGIC {
            return Err(CronosErrorKind::NotADataFile.into());
        }

        let mut tad = BufReader::new(File::open(tad_path)?);
        tad.seek(SeekFrom::Start(raw::TAD_HEADER))?;

        Ok(Records {
            tad,
            dat,
            table_id: table.map(|table| table.id),
            column_count: table.map(|table| table.columns.len()),
            index: 0,
        })
    }

    /// Follows the fragment chain of one index entry and returns the raw
    /// record payload.
    fn reassemble(&mut self, entry: &TadEntry) -> Option<Vec<u8>> {
        if entry.is_empty() {
            return None;
        }

        let mut payload = read_at(&mut self.dat, entry.offset, entry.length as usize)?;
        let mut next_offset = entry.next_offset;
        let mut next_length = entry.next_length;
        let mut steps = 0;

        while !chain_ended(next_length) {
            steps += 1;
            if steps > raw::MAX_CHAIN_STEPS {
                tracing::debug!(index = self.index, "fragment chain exceeds step bound");
                break;
            }

            let want = next_length.min(raw::FRAGMENT_STRIDE) as usize;
            let fragment = read_at(&mut self.dat, next_offset, want)?;
            if fragment.len() < raw::FRAGMENT_PTR {
                break;
            }

            next_offset = fragment.pread_with(0, LE).ok()?;
            payload.extend_from_slice(&fragment[raw::FRAGMENT_PTR..]);
            next_length = next_length.saturating_sub(raw::FRAGMENT_STRIDE);
        }

        Some(payload)
    }

    /// Splits a payload on the record separator and decodes the fields.
    fn split_fields(&self, payload: &[u8]) -> Record {
        let mut fields: Vec<String> = payload
            .split(|&byte| byte == raw::RECORD_SEP)
            .map(text::decode)
            .collect();

        if let Some(column_count) = self.column_count {
            if fields.len() != column_count {
                tracing::debug!(
                    index = self.index,
                    fields = fields.len(),
                    columns = column_count,
                    "record arity deviates from column count"
                );
                fields.insert(0, self.index.to_string());
            }
        }

        fields
    }
}

impl Iterator for Records {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        loop {
            let mut buf = [0u8; raw::TAD_ENTRY];
            if self.tad.read_exact(&mut buf).is_err() {
                // end of the index, or a trailing partial entry
                return None;
            }
            self.index += 1;

            let entry: TadEntry = buf.pread_with(0, LE).ok()?;
            let Some(payload) = self.reassemble(&entry) else {
                continue;
            };
            if payload.len() < 2 {
                continue;
            }
            if let Some(table_id) = self.table_id {
                if payload[0] != table_id {
                    continue;
                }
            }

            return Some(self.split_fields(&payload[1..]));
        }
    }
}

/// Reads up to `length` bytes at `offset`, stopping short at the end of the
/// file.
fn read_at(reader: &mut BufReader<File>, offset: u32, length: usize) -> Option<Vec<u8>> {
    reader.seek(SeekFrom::Start(offset as u64)).ok()?;

    let mut buf = vec![0u8; length];
    let mut filled = 0;
    while filled < length {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return None,
        }
    }
    buf.truncate(filled);
    Some(buf)
}
