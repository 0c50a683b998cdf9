//! Relation catalog
//!
//! A connection maps relation names to their sources: delimited files found
//! in a data directory, or in-memory tables registered by the caller. Scans
//! are opened per query through [`Connection::open_scan`].

use crate::config::{ConnectionConfig, EngineConfig, JoinConfig};
use crate::error::{Error, Result};
use crate::scan::csv::CsvOptions;
use crate::scan::{CsvScan, MemoryScan, MemoryTable, Scan};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Source {
    Csv(PathBuf),
    Memory(Arc<MemoryTable>),
}

#[derive(Debug, Clone)]
pub struct Connection {
    config: ConnectionConfig,
    join: JoinConfig,
    sources: BTreeMap<String, Source>,
}

impl Connection {
    /// Catalog every `.csv` file in `config.data_dir`.
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let dir = &config.data_dir;
        if !dir.is_dir() {
            return Err(Error::Connection(format!(
                "data directory {} does not exist",
                dir.display()
            )));
        }

        let mut sources = BTreeMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !is_relation_file(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                sources.insert(stem.to_lowercase(), Source::Csv(path.clone()));
            }
        }

        if sources.is_empty() {
            return Err(Error::Connection(format!(
                "no relation files found in {}",
                dir.display()
            )));
        }

        tracing::info!(
            data_dir = %dir.display(),
            relations = sources.len(),
            "connection opened"
        );

        Ok(Connection {
            config,
            join: JoinConfig::default(),
            sources,
        })
    }

    /// Open the data directory described by a full engine configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::open(config.connection.clone())?.with_join_config(config.join.clone()))
    }

    /// Empty catalog for tables registered with [`Connection::register_table`].
    pub fn in_memory() -> Self {
        Connection {
            config: ConnectionConfig::default(),
            join: JoinConfig::default(),
            sources: BTreeMap::new(),
        }
    }

    pub fn with_join_config(mut self, join: JoinConfig) -> Self {
        self.join = join;
        self
    }

    /// Add or replace an in-memory relation.
    pub fn register_table(&mut self, name: &str, table: MemoryTable) {
        let name = name.to_lowercase();
        tracing::debug!(relation = %name, rows = table.len(), "registered memory table");
        self.sources.insert(name, Source::Memory(Arc::new(table)));
    }

    pub fn exists(&self, name: &str) -> bool {
        self.sources.contains_key(&name.to_lowercase())
    }

    /// Relation names in sorted order
    pub fn relation_names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn max_combinations(&self) -> Option<u64> {
        self.join.max_combinations
    }

    /// Fresh, unselected scan over `name`, addressed as `alias`.
    pub fn open_scan(&self, name: &str, alias: &str) -> Result<Box<dyn Scan>> {
        let key = name.to_lowercase();
        match self.sources.get(&key) {
            Some(Source::Csv(path)) => Ok(Box::new(CsvScan::open(
                &key,
                alias,
                path,
                CsvOptions::from(&self.config),
            )?)),
            Some(Source::Memory(table)) => {
                Ok(Box::new(MemoryScan::new(&key, alias, Arc::clone(table))))
            }
            None => Err(Error::RelationNotFound(name.to_string())),
        }
    }
}

fn is_relation_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ScanState;
    use std::fs;

    #[test]
    fn test_open_catalogs_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Orders.csv"), "id\n1\n").unwrap();
        fs::write(dir.path().join("customers.CSV"), "id\nA\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let conn = Connection::open(ConnectionConfig::new(dir.path())).unwrap();
        assert_eq!(conn.relation_names(), ["customers", "orders"]);
        assert!(conn.exists("ORDERS"));
        assert!(!conn.exists("notes"));

        let scan = conn.open_scan("orders", "o").unwrap();
        assert_eq!(scan.relation_alias(), "o");
        assert_eq!(scan.state(), ScanState::Unselected);
    }

    #[test]
    fn test_open_rejects_bad_directories() {
        let err = Connection::open(ConnectionConfig::new("/no/such/dir")).unwrap_err();
        assert!(matches!(err, Error::Connection(_)));

        let empty = tempfile::tempdir().unwrap();
        let err = Connection::open(ConnectionConfig::new(empty.path())).unwrap_err();
        assert!(err.to_string().contains("no relation files"));
    }

    #[test]
    fn test_in_memory_catalog() {
        let mut conn = Connection::in_memory();
        assert!(conn.relation_names().is_empty());
        conn.register_table("People", MemoryTable::from_strs(&["id"], &[&["1"]]).unwrap());
        assert!(conn.exists("people"));

        let mut scan = conn.open_scan("people", "p").unwrap();
        scan.select(None).unwrap();
        assert_eq!(scan.matching_row_ids(), [0]);

        assert!(matches!(
            conn.open_scan("ghosts", "g"),
            Err(Error::RelationNotFound(_))
        ));
    }

    #[test]
    fn test_join_limit_from_config() {
        let conn = Connection::in_memory().with_join_config(JoinConfig {
            max_combinations: None,
        });
        assert_eq!(conn.max_combinations(), None);
        assert_eq!(
            Connection::in_memory().max_combinations(),
            JoinConfig::default().max_combinations
        );
    }
}
