//! Relation scans
//!
//! A scan is a cursor over one relation's rows. `select` computes the row ids
//! matching an optional filter, `start_read` fixes the projected columns, and
//! rows are then fetched by id (`read`, `read_row`) or in order (`next`).
//!
//! State machine: `Unselected -> Selected -> Reading -> Stopped`.

pub mod csv;
pub mod memory;

pub use self::csv::CsvScan;
pub use self::memory::{MemoryScan, MemoryTable};

use crate::error::{Error, Result};
use crate::sql::ast::{Parameters, Predicate};
use std::fmt;

/// Row identifier within a relation's source (0-based data row number)
pub type RowId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Unselected,
    Selected,
    Reading,
    Stopped,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanState::Unselected => "unselected",
            ScanState::Selected => "selected",
            ScanState::Reading => "reading",
            ScanState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Column names must be distinct, ignoring case.
pub(crate) fn check_unique_columns(relation: &str, columns: &[String]) -> Result<()> {
    for (i, name) in columns.iter().enumerate() {
        if columns[..i].iter().any(|c| c.eq_ignore_ascii_case(name)) {
            tracing::debug!(relation, column = %name, "duplicate column name");
            return Err(Error::ambiguous_column(name.clone()));
        }
    }
    Ok(())
}

/// Bookkeeping shared by every scan backend.
#[derive(Debug, Clone)]
pub struct ScanCore {
    relation_name: String,
    relation_alias: String,
    all_columns: Vec<String>,
    parameter_keys: Vec<String>,
    selected_columns: Vec<String>,
    selected_column_ids: Vec<usize>,
    matching_row_ids: Vec<RowId>,
    state: ScanState,
    cursor: usize,
}

impl ScanCore {
    pub fn new(
        relation_name: impl Into<String>,
        relation_alias: impl Into<String>,
        all_columns: Vec<String>,
    ) -> Self {
        let relation_alias = relation_alias.into();
        // predicates name columns in lowercase, whatever the source spells
        let parameter_keys = all_columns
            .iter()
            .map(|c| format!("{}.{}", relation_alias, c).to_lowercase())
            .collect();
        ScanCore {
            relation_name: relation_name.into(),
            relation_alias,
            all_columns,
            parameter_keys,
            selected_columns: Vec::new(),
            selected_column_ids: Vec::new(),
            matching_row_ids: Vec::new(),
            state: ScanState::Unselected,
            cursor: 0,
        }
    }

    fn expect_state(&self, operation: &'static str, allowed: &[ScanState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidScanState {
                relation: self.relation_alias.clone(),
                operation,
                state: self.state.to_string(),
            })
        }
    }

    /// Fill `params` with `alias.column -> value` for a full record.
    pub fn bind_parameters(&self, record: &[String], params: &mut Parameters) {
        for (key, value) in self.parameter_keys.iter().zip(record) {
            match params.get_mut(key.as_str()) {
                Some(slot) => {
                    slot.clear();
                    slot.push_str(value);
                }
                None => {
                    params.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Whether `record` passes `filter`; evaluation errors reject the row.
    pub fn admits(&self, filter: Option<&dyn Predicate>, record: &[String]) -> bool {
        let Some(filter) = filter else {
            return true;
        };
        let mut params = Parameters::new();
        self.bind_parameters(record, &mut params);
        match filter.evaluate(&params) {
            Ok(keep) => keep,
            Err(e) => {
                tracing::trace!(relation = %self.relation_alias, error = %e, "row rejected by filter error");
                false
            }
        }
    }

    /// Record the outcome of a backend's selection pass.
    pub fn finish_select(&mut self, row_ids: Vec<RowId>) {
        tracing::debug!(
            relation = %self.relation_name,
            alias = %self.relation_alias,
            rows = row_ids.len(),
            "scan selected"
        );
        self.matching_row_ids = row_ids;
        self.state = ScanState::Selected;
    }

    fn project(&self, record: &[String]) -> Vec<String> {
        self.selected_column_ids
            .iter()
            .map(|&id| record[id].clone())
            .collect()
    }

    fn resolve_columns(&mut self, columns: &[String]) -> Result<()> {
        let mut names = Vec::with_capacity(columns.len());
        let mut ids = Vec::with_capacity(columns.len());

        if columns.is_empty() {
            names.extend(self.all_columns.iter().cloned());
            ids.extend(0..self.all_columns.len());
        } else {
            for requested in columns {
                let id = self
                    .all_columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(requested))
                    .ok_or_else(|| Error::unknown_column(requested, &self.relation_alias))?;
                names.push(self.all_columns[id].clone());
                ids.push(id);
            }
        }

        self.selected_columns = names;
        self.selected_column_ids = ids;
        Ok(())
    }

    fn is_match(&self, row_id: RowId) -> bool {
        self.matching_row_ids.binary_search(&row_id).is_ok()
    }
}

/// Capability interface over one relation's rows.
///
/// Backends supply selection and record access; the state machine, column
/// resolution and cursor handling are provided.
pub trait Scan {
    fn core(&self) -> &ScanCore;

    fn core_mut(&mut self) -> &mut ScanCore;

    /// Compute the ascending ids of rows admitted by `filter`.
    fn select_rows(&mut self, filter: Option<&dyn Predicate>) -> Result<Vec<RowId>>;

    /// Every field of one row, in `all_columns` order.
    fn fetch(&mut self, row_id: RowId) -> Result<Vec<String>>;

    /// Drop any handle on the backing source.
    fn release(&mut self) {}

    fn relation_name(&self) -> &str {
        &self.core().relation_name
    }

    fn relation_alias(&self) -> &str {
        &self.core().relation_alias
    }

    fn all_columns(&self) -> &[String] {
        &self.core().all_columns
    }

    fn selected_columns(&self) -> &[String] {
        &self.core().selected_columns
    }

    fn selected_column_ids(&self) -> &[usize] {
        &self.core().selected_column_ids
    }

    fn matching_row_ids(&self) -> &[RowId] {
        &self.core().matching_row_ids
    }

    fn state(&self) -> ScanState {
        self.core().state
    }

    /// `Unselected -> Selected`. `None` selects every row.
    fn select(&mut self, filter: Option<&dyn Predicate>) -> Result<()> {
        self.core().expect_state("select", &[ScanState::Unselected])?;
        let rows = self.select_rows(filter)?;
        self.core_mut().finish_select(rows);
        Ok(())
    }

    /// `Selected | Reading -> Reading`. An empty list reads every column.
    fn start_read(&mut self, columns: &[String]) -> Result<()> {
        self.core()
            .expect_state("start reading", &[ScanState::Selected, ScanState::Reading])?;
        let core = self.core_mut();
        core.resolve_columns(columns)?;
        core.cursor = 0;
        core.state = ScanState::Reading;
        Ok(())
    }

    /// Selected columns of `row_id`, in selection order. Does not move the cursor.
    fn read(&mut self, row_id: RowId) -> Result<Vec<String>> {
        self.core().expect_state("read", &[ScanState::Reading])?;
        let record = self.read_row(row_id)?;
        Ok(self.core().project(&record))
    }

    /// Every column of `row_id`.
    fn read_row(&mut self, row_id: RowId) -> Result<Vec<String>> {
        self.core()
            .expect_state("read", &[ScanState::Selected, ScanState::Reading])?;
        if !self.core().is_match(row_id) {
            return Err(Error::RowNotFound {
                relation: self.relation_alias().to_string(),
                row_id,
            });
        }
        self.fetch(row_id)
    }

    /// Selected columns of the next matching row, or `None` when exhausted.
    fn next(&mut self) -> Result<Option<Vec<String>>> {
        self.core().expect_state("advance", &[ScanState::Reading])?;
        let core = self.core();
        let Some(&row_id) = core.matching_row_ids.get(core.cursor) else {
            return Ok(None);
        };
        let values = self.read(row_id)?;
        self.core_mut().cursor += 1;
        Ok(Some(values))
    }

    /// Any state -> `Stopped`. Idempotent.
    fn stop_read(&mut self) {
        if self.state() != ScanState::Stopped {
            self.release();
            self.core_mut().state = ScanState::Stopped;
        }
    }
}
