//! Delimited text file backend
//!
//! Row ids are 0-based data row numbers (the header line, when present, is
//! not a row). `select` walks the file once, checking every row's width and
//! remembering where each row starts so `fetch` can seek straight to it.

use super::{check_unique_columns, RowId, Scan, ScanCore};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::sql::ast::Predicate;
use ::csv::{ByteRecord, Position, Reader, ReaderBuilder};
use encoding_rs::{Encoding, UTF_8};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Parsing options for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub separator: u8,
    pub quote: u8,
    pub has_header: bool,
    /// Must be ASCII compatible; fields are split before decoding
    pub encoding: &'static Encoding,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions {
            separator: b';',
            quote: b'"',
            has_header: true,
            encoding: UTF_8,
        }
    }
}

impl From<&ConnectionConfig> for CsvOptions {
    fn from(config: &ConnectionConfig) -> Self {
        // validated by ConnectionConfig::validate
        CsvOptions {
            separator: config.separator as u8,
            quote: config.quote as u8,
            has_header: config.has_header,
            encoding: config.file_encoding().unwrap_or(UTF_8),
        }
    }
}

pub struct CsvScan {
    core: ScanCore,
    path: PathBuf,
    options: CsvOptions,
    reader: Option<Reader<File>>,
    data_start: Position,
    positions: Vec<Position>,
    record: ByteRecord,
    /// Row the open reader will yield next without seeking
    next_row: Option<RowId>,
}

impl CsvScan {
    /// Open `path` and read its column names.
    pub fn open(
        relation_name: &str,
        relation_alias: &str,
        path: impl AsRef<Path>,
        options: CsvOptions,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = open_reader(&path, &options)?;
        let mut first = ByteRecord::new();

        let start = reader.position().clone();
        let has_first = reader
            .read_byte_record(&mut first)
            .map_err(|e| csv_error(&path, e))?;

        let (columns, data_start) = if !has_first {
            (Vec::new(), start)
        } else if options.has_header {
            let names = decode(options.encoding, &first)
                .map(|h| h.trim().to_lowercase())
                .collect::<Vec<_>>();
            check_unique_columns(relation_name, &names)?;
            (names, reader.position().clone())
        } else {
            let names = (0..first.len()).map(|i| format!("col{}", i)).collect();
            (names, start)
        };

        tracing::debug!(
            relation = relation_name,
            path = %path.display(),
            columns = columns.len(),
            "opened delimited file"
        );

        Ok(CsvScan {
            core: ScanCore::new(relation_name, relation_alias, columns),
            path,
            options,
            reader: Some(reader),
            data_start,
            positions: Vec::new(),
            record: ByteRecord::new(),
            next_row: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The open reader, reopening the file after a `release`.
    fn take_reader(&mut self) -> Result<Reader<File>> {
        match self.reader.take() {
            Some(reader) => Ok(reader),
            None => {
                self.next_row = None;
                open_reader(&self.path, &self.options)
            }
        }
    }
}

impl Scan for CsvScan {
    fn core(&self) -> &ScanCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ScanCore {
        &mut self.core
    }

    fn select_rows(&mut self, filter: Option<&dyn Predicate>) -> Result<Vec<RowId>> {
        let path = self.path.clone();
        let width = self.core.all_columns.len();
        let data_start = self.data_start.clone();

        let mut positions = Vec::new();
        let mut matching = Vec::new();
        let mut record = ByteRecord::new();
        let encoding = self.options.encoding;
        let mut fields: Vec<String> = Vec::with_capacity(width);

        let mut reader = self.take_reader()?;
        reader.seek(data_start).map_err(|e| csv_error(&path, e))?;

        loop {
            let pos = reader.position().clone();
            if !reader
                .read_byte_record(&mut record)
                .map_err(|e| csv_error(&path, e))?
            {
                break;
            }
            let row_id = positions.len() as RowId;
            if record.len() != width {
                return Err(Error::MalformedRow {
                    relation: self.core.relation_name.clone(),
                    row: row_id,
                    expected: width,
                    found: record.len(),
                });
            }

            fields.clear();
            fields.extend(decode(encoding, &record));
            if self.core.admits(filter, &fields) {
                matching.push(row_id);
            }
            positions.push(pos);
        }

        self.reader = Some(reader);
        self.positions = positions;
        // reader sits at end of file
        self.next_row = Some(self.positions.len() as RowId);
        Ok(matching)
    }

    fn fetch(&mut self, row_id: RowId) -> Result<Vec<String>> {
        let pos = usize::try_from(row_id)
            .ok()
            .and_then(|i| self.positions.get(i))
            .cloned()
            .ok_or_else(|| Error::RowNotFound {
                relation: self.core.relation_alias.clone(),
                row_id,
            })?;

        let path = self.path.clone();
        let mut record = std::mem::take(&mut self.record);
        let mut reader = self.take_reader()?;
        let sequential = self.next_row == Some(row_id);
        if !sequential {
            reader.seek(pos).map_err(|e| csv_error(&path, e))?;
        }
        let found = reader
            .read_byte_record(&mut record)
            .map_err(|e| csv_error(&path, e))?;
        self.reader = Some(reader);

        let values = decode(self.options.encoding, &record).collect();
        self.record = record;

        if !found {
            self.next_row = None;
            return Err(Error::RowNotFound {
                relation: self.core.relation_alias.clone(),
                row_id,
            });
        }
        self.next_row = Some(row_id + 1);
        Ok(values)
    }

    fn release(&mut self) {
        if self.reader.take().is_some() {
            tracing::debug!(path = %self.path.display(), "closed delimited file");
        }
        self.next_row = None;
    }
}

impl Drop for CsvScan {
    fn drop(&mut self) {
        self.stop_read();
    }
}

fn open_reader(path: &Path, options: &CsvOptions) -> Result<Reader<File>> {
    ReaderBuilder::new()
        .delimiter(options.separator)
        .quote(options.quote)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))
}

/// Decode each field; malformed sequences become U+FFFD.
fn decode<'r>(
    encoding: &'static Encoding,
    record: &'r ByteRecord,
) -> impl Iterator<Item = String> + 'r {
    record
        .iter()
        .map(move |field| encoding.decode_without_bom_handling(field).0.into_owned())
}

fn csv_error(path: &Path, source: ::csv::Error) -> Error {
    Error::Csv {
        path: path.to_path_buf(),
        source,
    }
}
