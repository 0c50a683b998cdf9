//! In-memory relation backend

use super::{check_unique_columns, RowId, Scan, ScanCore};
use crate::error::{Error, Result};
use crate::sql::ast::Predicate;
use std::sync::Arc;

/// Column names plus string rows, shared between the catalog and its scans.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MemoryTable {
    /// Every row must have one value per column, and column names must be
    /// distinct ignoring case.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        check_unique_columns("<memory>", &columns)?;
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::MalformedRow {
                    relation: "<memory>".to_string(),
                    row: i as u64,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(MemoryTable { columns, rows })
    }

    /// Build from string slices, convenient for fixtures.
    pub fn from_strs(columns: &[&str], rows: &[&[&str]]) -> Result<Self> {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct MemoryScan {
    core: ScanCore,
    table: Arc<MemoryTable>,
}

impl MemoryScan {
    pub fn new(relation_name: &str, relation_alias: &str, table: Arc<MemoryTable>) -> Self {
        MemoryScan {
            core: ScanCore::new(relation_name, relation_alias, table.columns.clone()),
            table,
        }
    }
}

impl Scan for MemoryScan {
    fn core(&self) -> &ScanCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ScanCore {
        &mut self.core
    }

    fn select_rows(&mut self, filter: Option<&dyn Predicate>) -> Result<Vec<RowId>> {
        Ok(self
            .table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.core.admits(filter, row))
            .map(|(i, _)| i as RowId)
            .collect())
    }

    fn fetch(&mut self, row_id: RowId) -> Result<Vec<String>> {
        usize::try_from(row_id)
            .ok()
            .and_then(|i| self.table.rows.get(i))
            .cloned()
            .ok_or_else(|| Error::RowNotFound {
                relation: self.core.relation_alias.clone(),
                row_id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_ragged_rows() {
        let err = MemoryTable::from_strs(&["a", "b"], &[&["1", "2"], &["3"]]).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedRow {
                row: 1,
                expected: 2,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let err = MemoryTable::from_strs(&["id", "ID"], &[&["1", "2"]]).unwrap_err();
        assert_eq!(err.to_string(), "Ambiguous definition for column ID");
    }

    #[test]
    fn test_scan_shares_table() {
        let table = Arc::new(MemoryTable::from_strs(&["a"], &[&["x"], &["y"]]).unwrap());
        let mut first = MemoryScan::new("t", "t1", Arc::clone(&table));
        let mut second = MemoryScan::new("t", "t2", table);

        first.select(None).unwrap();
        second.select(None).unwrap();
        assert_eq!(first.matching_row_ids(), second.matching_row_ids());
        assert_eq!(first.relation_alias(), "t1");
        assert_eq!(second.fetch(1).unwrap(), ["y"]);
    }

    #[test]
    fn test_empty_table() {
        let table = Arc::new(MemoryTable::from_strs(&["a"], &[]).unwrap());
        let mut scan = MemoryScan::new("t", "t", table);
        scan.select(None).unwrap();
        assert!(scan.matching_row_ids().is_empty());
        scan.start_read(&[]).unwrap();
        assert_eq!(scan.next().unwrap(), None);
    }
}
