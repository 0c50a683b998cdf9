//! PollyDB Core
//!
//! A small read-only SQL engine over delimited text files. Queries are parsed
//! into a logical model, each relation is read through a [`scan::Scan`], and
//! relations are combined by a nested-loop join driven by a flat
//! AND/OR condition chain.
//!
//! ```no_run
//! use pollydb::{Command, Connection, ConnectionConfig};
//!
//! let conn = Connection::open(ConnectionConfig::new("./data"))?;
//! let result = Command::new(
//!     "select o.id, c.name from orders o join customers c on o.cust = c.id",
//!     &conn,
//! )
//! .execute_query()?;
//! # Ok::<(), pollydb::Error>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod scan;
pub mod sql;

pub use config::{ConnectionConfig, EngineConfig};
pub use connection::Connection;
pub use error::{Error, Result};
pub use sql::{Command, DataReader, QueryResult};
