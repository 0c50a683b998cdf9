// Data Reader - forward-only cursor over a join result
use super::join::JoinIndex;
use super::types::LogicalType;
use crate::error::{Error, Result};
use crate::scan::Scan;
use serde::{Deserialize, Serialize};

/// One output column: where its value comes from and how it is named.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    pub name: String,
    /// Position of the scan in join order
    pub scan: usize,
    /// Position within that scan's selected columns
    pub position: usize,
    pub logical_type: LogicalType,
}

/// Fully materialized query result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads joined rows one at a time.
///
/// Owns the query's scans and stops them on `close` or drop.
pub struct DataReader {
    scans: Vec<Box<dyn Scan>>,
    index: JoinIndex,
    columns: Vec<OutputColumn>,
    next_entry: usize,
    current: Option<Vec<String>>,
    closed: bool,
}

impl DataReader {
    pub fn new(scans: Vec<Box<dyn Scan>>, index: JoinIndex, columns: Vec<OutputColumn>) -> Self {
        DataReader {
            scans,
            index,
            columns,
            next_entry: 0,
            current: None,
            closed: false,
        }
    }

    /// Advance to the next row. Returns false once the result is exhausted
    /// or the reader is closed.
    pub fn read(&mut self) -> Result<bool> {
        self.current = None;
        if self.closed {
            return Ok(false);
        }
        let Some(row_ids) = self.index.get(self.next_entry) else {
            return Ok(false);
        };
        self.next_entry += 1;

        let mut fetched: Vec<Option<Vec<String>>> = vec![None; self.scans.len()];
        let mut values = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let record = match &mut fetched[column.scan] {
                Some(record) => record,
                slot => slot.insert(self.scans[column.scan].read(row_ids[column.scan])?),
            };
            values.push(record[column.position].clone());
        }

        self.current = Some(values);
        Ok(true)
    }

    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Values of the row the last successful `read` moved to
    pub fn current_row(&self) -> Option<&[String]> {
        self.current.as_deref()
    }

    pub fn get_value(&self, ordinal: usize) -> Result<&str> {
        let row = self.current.as_ref().ok_or(Error::NoCurrentRow)?;
        self.check_ordinal(ordinal)?;
        Ok(&row[ordinal])
    }

    pub fn get_name(&self, ordinal: usize) -> Result<&str> {
        self.check_ordinal(ordinal)?;
        Ok(&self.columns[ordinal].name)
    }

    /// Ordinal of the column named `name`, ignoring case.
    pub fn get_ordinal(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::unknown_column(name, "result"))
    }

    pub fn get_data_type_name(&self, ordinal: usize) -> Result<&'static str> {
        self.check_ordinal(ordinal)?;
        Ok(self.columns[ordinal].logical_type.name())
    }

    fn check_ordinal(&self, ordinal: usize) -> Result<()> {
        if ordinal < self.columns.len() {
            Ok(())
        } else {
            Err(Error::ColumnOutOfRange {
                ordinal,
                count: self.columns.len(),
            })
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop every scan. Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        for scan in &mut self.scans {
            scan.stop_read();
        }
        self.current = None;
        self.closed = true;
    }

    /// Drain the remaining rows and close.
    pub fn into_result(mut self) -> Result<QueryResult> {
        let columns = self.column_names();
        let mut rows = Vec::new();
        while self.read()? {
            if let Some(row) = self.current.take() {
                rows.push(row);
            }
        }
        self.close();
        Ok(QueryResult { columns, rows })
    }
}

impl Drop for DataReader {
    fn drop(&mut self) {
        self.close();
    }
}
