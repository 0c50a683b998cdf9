// Query Executor - parse, scan, join and hand back a reader
use super::ast::{ConditionChain, Predicate};
use super::join::{JoinIndex, NestedLoopJoin};
use super::parser::parse_query;
use super::reader::{DataReader, OutputColumn, QueryResult};
use super::types::{JoinRole, Query};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::scan::Scan;

/// One SELECT statement bound to a connection.
pub struct Command<'c> {
    text: String,
    connection: &'c Connection,
}

impl<'c> Command<'c> {
    pub fn new(text: impl Into<String>, connection: &'c Connection) -> Self {
        Command {
            text: text.into(),
            connection,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Run the query and return a reader positioned before the first row.
    pub fn execute_reader(&self) -> Result<DataReader> {
        let query = parse_query(&self.text)?;

        if let Some(full) = query
            .relations()
            .iter()
            .find(|r| r.join_role == JoinRole::Full)
        {
            return Err(Error::Unsupported(format!("full join on {}", full.name)));
        }
        for relation in query.relations() {
            if !self.connection.exists(&relation.name) {
                return Err(Error::RelationNotFound(relation.name.clone()));
            }
        }

        let mut scans: Vec<Box<dyn Scan>> = Vec::with_capacity(query.relations().len());
        let (index, columns) = match self.prepare(&query, &mut scans) {
            Ok(prepared) => prepared,
            Err(e) => {
                for scan in &mut scans {
                    scan.stop_read();
                }
                return Err(e);
            }
        };

        tracing::info!(
            relations = scans.len(),
            columns = columns.len(),
            rows = index.len(),
            "query executed"
        );
        Ok(DataReader::new(scans, index, columns))
    }

    /// Run the query and collect every row.
    pub fn execute_query(&self) -> Result<QueryResult> {
        self.execute_reader()?.into_result()
    }

    /// First column of the first row
    pub fn execute_scalar(&self) -> Result<Option<String>> {
        let mut reader = self.execute_reader()?;
        if reader.field_count() == 0 || !reader.read()? {
            return Ok(None);
        }
        Ok(Some(reader.get_value(0)?.to_string()))
    }

    /// Relations are read-only.
    pub fn execute_non_query(&self) -> Result<u64> {
        Err(Error::Unsupported(
            "data modification; relations are read-only".to_string(),
        ))
    }

    /// Open the scans into `scans`, join them and lay out the output.
    fn prepare(
        &self,
        query: &Query,
        scans: &mut Vec<Box<dyn Scan>>,
    ) -> Result<(JoinIndex, Vec<OutputColumn>)> {
        let predicate = query.predicate();
        self.open_scans(query, &predicate, scans)?;

        let mut join = NestedLoopJoin::new(&predicate)
            .with_max_combinations(self.connection.max_combinations());
        let index = join.execute(scans)?;

        Ok((index, output_columns(query, scans)?))
    }

    /// Open, select and start reading one scan per relation, in relation order.
    fn open_scans(
        &self,
        query: &Query,
        predicate: &ConditionChain,
        scans: &mut Vec<Box<dyn Scan>>,
    ) -> Result<()> {
        for relation in query.relations() {
            let mut scan = self.connection.open_scan(&relation.name, &relation.alias)?;

            // single-relation terms of an AND-only chain can filter early
            let filter = predicate.restricted_to(&relation.alias);
            scan.select(filter.as_ref().map(|f| f as &dyn Predicate))?;

            let columns = if query.is_wildcard() {
                Vec::new()
            } else {
                relation.column_names()
            };
            scan.start_read(&columns)?;
            scans.push(scan);
        }
        Ok(())
    }
}

/// Output columns in projection order, or every column of every scan for `*`.
fn output_columns(query: &Query, scans: &[Box<dyn Scan>]) -> Result<Vec<OutputColumn>> {
    if query.is_wildcard() {
        let qualify = scans.len() > 1;
        let columns = scans
            .iter()
            .enumerate()
            .flat_map(|(i, scan)| {
                scan.selected_columns()
                    .iter()
                    .enumerate()
                    .map(move |(position, name)| OutputColumn {
                        name: if qualify {
                            format!("{}.{}", scan.relation_alias(), name)
                        } else {
                            name.clone()
                        },
                        scan: i,
                        position,
                        logical_type: Default::default(),
                    })
            })
            .collect();
        return Ok(columns);
    }

    query
        .projection()
        .iter()
        .map(|column| {
            let scan = scans
                .iter()
                .position(|s| s.relation_alias() == column.relation_alias)
                .ok_or_else(|| Error::RelationNotFound(column.relation_alias.clone()))?;
            let position = scans[scan]
                .selected_columns()
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&column.name))
                .ok_or_else(|| Error::unknown_column(&column.name, &column.relation_alias))?;
            Ok(OutputColumn {
                name: column.output_name().to_string(),
                scan,
                position,
                logical_type: column.logical_type,
            })
        })
        .collect()
}
